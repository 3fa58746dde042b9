//! Error taxonomy: fatal service failures and non-fatal pipeline warnings.

use thiserror::Error;

/// Failures talking to the generation service. Classified from HTTP status
/// and response text so each variant can carry actionable guidance.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("authentication failed: {0}; run `testloom setup` to store a valid API key")]
    Unauthorized(String),

    #[error("rate limited: {0}; wait a moment before retrying")]
    RateLimited(String),

    #[error("service unavailable: {0}; the provider looks overloaded, retry shortly")]
    ServiceUnavailable(String),

    #[error("network error: {0}; check your connection")]
    Connectivity(String),

    #[error("no API key configured; run `testloom setup` or set OPENROUTER_API_KEY")]
    MissingApiKey,

    #[error("generation service error: {0}")]
    Unknown(String),
}

impl ServiceError {
    /// Map an HTTP status and response body to a variant. Falls back to
    /// message sniffing when the status alone is ambiguous.
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();
        let detail = crate::util::truncate(message.trim(), 200);
        match status {
            Some(401) | Some(403) => ServiceError::Unauthorized(detail),
            Some(429) => ServiceError::RateLimited(detail),
            Some(500) | Some(502) | Some(503) | Some(504) => ServiceError::ServiceUnavailable(detail),
            _ => {
                if lower.contains("api key") || lower.contains("unauthorized") {
                    ServiceError::Unauthorized(detail)
                } else if lower.contains("rate limit") || lower.contains("resource_exhausted") {
                    ServiceError::RateLimited(detail)
                } else if lower.contains("overloaded") || lower.contains("unavailable") {
                    ServiceError::ServiceUnavailable(detail)
                } else if lower.contains("network") || lower.contains("fetch") {
                    ServiceError::Connectivity(detail)
                } else {
                    ServiceError::Unknown(detail)
                }
            }
        }
    }

    /// Whether another round against the service could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::RateLimited(_)
                | ServiceError::ServiceUnavailable(_)
                | ServiceError::Connectivity(_)
        )
    }
}

/// Degraded-but-recoverable conditions. These ride along on the result as
/// warnings and never abort a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineWarning {
    #[error("round {round}: no test blocks could be extracted from the response")]
    NothingExtracted { round: u32 },

    #[error("dropped candidate '{name}': unterminated string or comment")]
    UnterminatedBlock { name: String },

    #[error("dropped candidate '{name}': closing delimiter never found")]
    UnclosedBlock { name: String },

    #[error("round {round} failed: {message}")]
    RoundFailed { round: u32, message: String },

    #[error("produced {produced} of {requested} requested tests")]
    UnderTarget { requested: usize, produced: usize },

    #[error("output check: {0}")]
    OutputCheck(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_status_code() {
        assert!(matches!(
            ServiceError::classify(Some(401), "bad key"),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            ServiceError::classify(Some(429), "slow down"),
            ServiceError::RateLimited(_)
        ));
        assert!(matches!(
            ServiceError::classify(Some(503), "try later"),
            ServiceError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn classify_by_message_when_status_missing() {
        assert!(matches!(
            ServiceError::classify(None, "Invalid API key provided"),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            ServiceError::classify(None, "RESOURCE_EXHAUSTED: quota"),
            ServiceError::RateLimited(_)
        ));
        assert!(matches!(
            ServiceError::classify(None, "model is overloaded"),
            ServiceError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            ServiceError::classify(None, "network timeout during fetch"),
            ServiceError::Connectivity(_)
        ));
        assert!(matches!(
            ServiceError::classify(None, "something odd"),
            ServiceError::Unknown(_)
        ));
    }

    #[test]
    fn retryable_split() {
        assert!(ServiceError::RateLimited(String::new()).is_retryable());
        assert!(ServiceError::Connectivity(String::new()).is_retryable());
        assert!(!ServiceError::Unauthorized(String::new()).is_retryable());
        assert!(!ServiceError::MissingApiKey.is_retryable());
    }

    #[test]
    fn messages_carry_guidance() {
        let err = ServiceError::classify(Some(401), "nope");
        assert!(err.to_string().contains("testloom setup"));
        let err = ServiceError::classify(Some(429), "nope");
        assert!(err.to_string().contains("retry"));
    }
}
