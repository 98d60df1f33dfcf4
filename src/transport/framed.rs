//! Newline-delimited framing shared by the IPC and TCP transports.
//!
//! Each `"{KIND} {json}"` frame (§6) is written as one line; `serde_json`'s
//! compact output never contains a raw newline, so a line is exactly one
//! frame. Only the task produced by [`spawn_line_writer`] ever writes to a
//! given socket half, and only the one from [`spawn_line_reader`] ever reads
//! from it, keeping each half single-owner per §5.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Read lines from `reader` and forward each to `sink` until EOF or the
/// sink's receiver is dropped. Empty lines are skipped (§4.1 Listen: "empty
/// payloads are dropped").
pub(crate) async fn spawn_line_reader<R>(reader: R, sink: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    use tokio::io::AsyncBufReadExt;

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.is_empty() {
                    continue;
                }
                if sink.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%error, "transport read error, closing connection");
                break;
            }
        }
    }
}

/// Drain `queue` and write each frame as a line to `writer` until the queue
/// is closed or a write fails.
pub(crate) async fn spawn_line_writer<W>(mut writer: W, mut queue: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(frame) = queue.recv().await {
        if let Err(error) = writer.write_all(frame.as_bytes()).await {
            tracing::warn!(%error, "transport write error, closing connection");
            break;
        }
        if let Err(error) = writer.write_all(b"\n").await {
            tracing::warn!(%error, "transport write error, closing connection");
            break;
        }
        if let Err(error) = writer.flush().await {
            tracing::warn!(%error, "transport flush error, closing connection");
            break;
        }
    }
}
