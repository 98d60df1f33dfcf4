//! Serde helpers shared by the wire model.

/// (De)serializes a [`std::time::Duration`] as a whole number of seconds,
/// matching the wire convention that `timeout` is an integer seconds field.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "super::duration_secs")]
        timeout: Duration,
    }

    #[test]
    fn round_trips_as_integer_seconds() {
        let wrapper = Wrapper {
            timeout: Duration::from_secs(5),
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        assert_eq!(json, r#"{"timeout":5}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeout, Duration::from_secs(5));
    }
}
