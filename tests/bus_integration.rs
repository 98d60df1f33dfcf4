//! End-to-end tests that stand up a real [`Broker`] and real [`Client`]s over
//! an actual IPC transport (a Unix domain socket), instead of exercising
//! `dispatch` or `BrokerState`/`ClientState` in isolation.
//!
//! Coverage, one test per scenario:
//! - pub/sub happy path
//! - ping
//! - request/respond
//! - directory (`get_clients`)
//! - the broker's pending-request table draining within a bounded window
//!   after the request's own timeout elapses
//! - an event on a topic with no subscribers is dropped without disturbing
//!   the broker

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aductbus::broker::Broker;
use aductbus::client::Client;
use aductbus::config::{BrokerConfig, ClientConfig};
use aductbus::transport::{IpcDealer, IpcRouter};

static SOCKET_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_socket_path() -> PathBuf {
    let n = SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("aductbus-it-{}-{n}.sock", std::process::id()))
}

/// Bind a broker at a fresh socket path and connect+start one client per name.
async fn spawn_bus(
    broker_config: BrokerConfig,
    names: &[&str],
) -> (Broker<IpcRouter>, Vec<Client<IpcDealer>>, PathBuf) {
    let path = temp_socket_path();
    let router = IpcRouter::bind(&path).await.expect("bind ipc router");
    let mut broker = Broker::new(router, broker_config);
    broker.start().expect("start broker");

    let mut clients = Vec::new();
    for name in names {
        let dealer = IpcDealer::connect(&path).await.expect("connect ipc dealer");
        let mut client = Client::new(*name, dealer, ClientConfig::default());
        client.start().await.expect("client start/register");
        clients.push(client);
    }

    (broker, clients, path)
}

async fn teardown(mut broker: Broker<IpcRouter>, mut clients: Vec<Client<IpcDealer>>, path: PathBuf) {
    for client in clients.iter_mut() {
        client.stop().await;
    }
    broker.stop().await;
    let _ = std::fs::remove_file(&path);
}

// ============================================================================
// Pub/sub
// ============================================================================

#[tokio::test]
async fn pub_sub_happy_path_delivers_to_subscriber() {
    let (broker, mut clients, path) = spawn_bus(BrokerConfig::default(), &["alice", "bob"]).await;
    let bob = clients.remove(1);
    let alice = clients.remove(0);

    let mut inbox = bob.subscribe("announcements").await.unwrap();
    let event = alice.generate_event("announcements", "hello from alice");
    alice.publish(event).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("event delivered before timeout")
        .expect("channel open");
    assert_eq!(received.body(), "hello from alice");
    assert_eq!(received.source(), "alice");

    teardown(broker, vec![alice, bob], path).await;
}

// ============================================================================
// Ping
// ============================================================================

#[tokio::test]
async fn ping_reaches_target_and_returns_true() {
    let (broker, clients, path) = spawn_bus(BrokerConfig::default(), &["alice", "bob"]).await;
    let alice = &clients[0];

    let ok = alice.ping("bob").await;
    assert!(ok);

    teardown(broker, clients, path).await;
}

// ============================================================================
// Request/respond
// ============================================================================

#[tokio::test]
async fn request_respond_round_trip_delivers_reply() {
    let (broker, mut clients, path) = spawn_bus(BrokerConfig::default(), &["alice", "bob"]).await;
    let bob = clients.remove(1);
    let alice = clients.remove(0);

    let request = alice.generate_request("bob", "what's the weather", Duration::from_secs(5));
    let (response, ()) = tokio::join!(alice.request(request), async {
        let incoming = bob.next_request().await.expect("bob receives the request");
        assert_eq!(incoming.body(), "what's the weather");
        bob.respond(&incoming, "sunny").unwrap();
    });

    assert_eq!(response.unwrap().body(), "sunny");

    teardown(broker, vec![alice, bob], path).await;
}

// ============================================================================
// Directory
// ============================================================================

#[tokio::test]
async fn get_clients_excludes_the_requester() {
    let (broker, clients, path) = spawn_bus(BrokerConfig::default(), &["alice", "bob", "carol"]).await;
    let alice = &clients[0];

    let mut names = alice.get_clients().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["bob".to_string(), "carol".to_string()]);

    teardown(broker, clients, path).await;
}

// ============================================================================
// Pending-table watchdog
// ============================================================================

#[tokio::test]
async fn timed_out_request_drains_from_the_pending_table() {
    let broker_config = BrokerConfig::builder()
        .with_watchdog_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let (broker, clients, path) = spawn_bus(broker_config, &["alice", "bob"]).await;
    let alice = &clients[0];

    // "bob" never calls next_request()/respond(), so this request is never
    // answered; both the client's own wait and the broker's watchdog expire
    // it against the same 50ms timeout.
    let request = alice.generate_request("bob", "are you there?", Duration::from_millis(50));
    let result = alice.request(request).await;
    assert!(result.is_err());

    let mut drained = false;
    for _ in 0..30 {
        if broker.pending_count() == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(drained, "pending table did not drain within 300ms of the request timeout");

    teardown(broker, clients, path).await;
}

// ============================================================================
// Unknown-topic publish
// ============================================================================

#[tokio::test]
async fn event_on_unsubscribed_topic_is_dropped_without_disturbing_the_broker() {
    let (broker, clients, path) = spawn_bus(BrokerConfig::default(), &["alice", "bob"]).await;
    let alice = &clients[0];

    let event = alice.generate_event("nobody-listens", "anyone out there?");
    alice.publish(event).unwrap();

    // The broker keeps routing unrelated traffic after silently dropping it.
    assert!(alice.ping("bob").await);

    teardown(broker, clients, path).await;
}
