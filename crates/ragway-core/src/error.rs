use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagwayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote returned {status} from {url}: {body}")]
    Remote {
        status: u16,
        body: String,
        url: String,
    },

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("semantic search failed: {0}")]
    Semantic(String),

    #[error("summary generation failed: {0}")]
    Summary(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("stream idle beyond per-idle budget")]
    PerIdleTimeout,

    #[error("stream idle budget exhausted")]
    TotalTimeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagwayError {
    /// Label value recorded under `errors_total{error_type=…}`.
    pub fn error_type(&self) -> &'static str {
        match self {
            RagwayError::Config(_) => "config",
            RagwayError::Transport(_) => "transport",
            RagwayError::Remote { .. } => "remote",
            RagwayError::Decode(_) => "decode",
            RagwayError::Semantic(_) => "semantic",
            RagwayError::Summary(_) => "summary",
            RagwayError::Classification(_) => "classification",
            RagwayError::PerIdleTimeout => "per_idle",
            RagwayError::TotalTimeout => "total",
            RagwayError::Cancelled => "cancelled",
            RagwayError::Io(_) => "io",
            RagwayError::Serialization(_) => "decode",
        }
    }

    /// Shorthand for wrapping a transport-level failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        RagwayError::Transport(err.to_string())
    }

    /// Shorthand for wrapping a malformed-payload failure.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        RagwayError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagwayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_matches_metric_taxonomy() {
        assert_eq!(RagwayError::transport("dns").error_type(), "transport");
        assert_eq!(
            RagwayError::Remote {
                status: 502,
                body: "bad gateway".into(),
                url: "http://idx/search".into(),
            }
            .error_type(),
            "remote"
        );
        assert_eq!(RagwayError::PerIdleTimeout.error_type(), "per_idle");
        assert_eq!(RagwayError::TotalTimeout.error_type(), "total");
        assert_eq!(RagwayError::Cancelled.error_type(), "cancelled");
    }

    #[test]
    fn remote_display_includes_status_and_url() {
        let e = RagwayError::Remote {
            status: 404,
            body: "not found".into(),
            url: "http://idx/definition".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("http://idx/definition"));
    }
}
