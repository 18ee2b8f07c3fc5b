use thiserror::Error;

/// Error taxonomy for baker, grouped by kind rather than by originating type
/// (spec.md §7), following `ando-core::error::AndoError`'s
/// `status_code()`/`to_json_body()` shape.
#[derive(Error, Debug)]
pub enum BakerError {
    /// Transient network failure during config poll or backend I/O. Logged
    /// and retried on the next tick; never removes a backend on its own.
    #[error("transient network error: {0}")]
    Transient(String),

    /// Undecodable JSON, unknown rule type, or invalid rule args. The
    /// affected endpoint is not admitted; previously-admitted backends for
    /// the same container/endpoint remain installed.
    #[error("configuration malformed: {0}")]
    ConfigMalformed(String),

    /// No route for the requested `(host, path)`. Surfaced as 503.
    #[error("service is not available")]
    NotFound,

    /// Missing middleware builder or decode failure at request time.
    /// Surfaced as 500; the route stays installed so a re-poll can repair
    /// it.
    #[error("rule resolution failed: {0}")]
    RuleResolution(String),

    /// Listener bind failure, missing required configuration, or any other
    /// condition that should terminate the process.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl BakerError {
    pub fn status_code(&self) -> u16 {
        match self {
            BakerError::NotFound => 503,
            BakerError::RuleResolution(_) => 500,
            BakerError::ConfigMalformed(_) => 500,
            BakerError::Transient(_) => 502,
            BakerError::Fatal(_) => 500,
            BakerError::Io(_) => 500,
            BakerError::Serde(_) => 500,
        }
    }

    /// `{"error":"<message>"}`, matching spec.md §6's client-facing bodies.
    pub fn to_json_body(&self) -> Vec<u8> {
        serde_json::json!({ "error": self.to_string() })
            .to_string()
            .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_503_with_spec_message() {
        let err = BakerError::NotFound;
        assert_eq!(err.status_code(), 503);
        let body = String::from_utf8(err.to_json_body()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"], "service is not available");
    }

    #[test]
    fn rule_resolution_is_500() {
        let err = BakerError::RuleResolution("unknown rule RateLimiter2".into());
        assert_eq!(err.status_code(), 500);
        let body = String::from_utf8(err.to_json_body()).unwrap();
        assert!(body.contains("unknown rule RateLimiter2"));
    }

    #[test]
    fn json_body_is_always_valid_json() {
        for err in [
            BakerError::Transient("timeout".into()),
            BakerError::ConfigMalformed("bad json".into()),
            BakerError::NotFound,
            BakerError::RuleResolution("x".into()),
            BakerError::Fatal("bind failed".into()),
        ] {
            let body = err.to_json_body();
            serde_json::from_slice::<serde_json::Value>(&body).expect("valid JSON");
        }
    }
}
