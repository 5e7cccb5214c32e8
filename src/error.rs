use thiserror::Error;

/// A persona definition that cannot be admitted to a room.
///
/// Offending personas are excluded from the member set entirely — never
/// retried, never defaulted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("persona '{id}' is missing required field '{field}'")]
    MissingField { id: String, field: &'static str },

    #[error("persona '{id}': response_probability {value} is outside [0, 1]")]
    ProbabilityRange { id: String, value: f64 },

    #[error("persona '{id}': min_delay_ms {min} exceeds max_delay_ms {max}")]
    DelayBounds { id: String, min: u64, max: u64 },
}

/// Failure from the text-generation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has no credential configured. Reported per-call rather
    /// than failing at startup; callers degrade to fallback text.
    #[error("provider is not configured (missing API key)")]
    Unavailable,

    #[error("provider returned no usable text")]
    EmptyResponse,

    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("provider request lane is closed")]
    LaneClosed,
}

impl ProviderError {
    /// Whether this error is worth retrying with backoff.
    ///
    /// Matches status codes 429/502/503 and a fixed set of failure signatures
    /// in the error text. Anything else fails immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Http { status, body } => {
                matches!(status, 429 | 502 | 503) || matches_transient_text(body)
            }
            ProviderError::Unavailable
            | ProviderError::EmptyResponse
            | ProviderError::LaneClosed => false,
        }
    }
}

fn matches_transient_text(text: &str) -> bool {
    let text = text.to_lowercase();
    [
        "rate limit",
        "quota",
        "timeout",
        "network",
        "temporarily unavailable",
    ]
    .iter()
    .any(|pattern| text.contains(pattern))
}

/// Generated text rejected before delivery.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("response is empty")]
    Empty,

    #[error("response length {0} is outside the accepted range")]
    Length(usize),

    #[error("response matches a refusal pattern")]
    Refusal,
}

#[cfg(test)]
mod tests {
    use super::ProviderError;

    #[test]
    fn transient_status_codes() {
        for status in [429u16, 502, 503] {
            let err = ProviderError::Http {
                status,
                body: String::new(),
            };
            assert!(err.is_transient(), "{status} should be transient");
        }
        let err = ProviderError::Http {
            status: 400,
            body: "bad request".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_body_signatures() {
        let err = ProviderError::Http {
            status: 500,
            body: "Resource quota exceeded for project".into(),
        };
        assert!(err.is_transient());

        let err = ProviderError::Http {
            status: 500,
            body: "internal error".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn unavailable_is_terminal() {
        assert!(!ProviderError::Unavailable.is_transient());
        assert!(!ProviderError::EmptyResponse.is_transient());
    }
}
