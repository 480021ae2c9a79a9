use thiserror::Error;

/// Everything that can go wrong while announcing a flagged track.
///
/// `Config` is the only fatal variant and only appears at startup. The rest
/// are scoped to one entity (or one tick, for a failed fetch) and are logged
/// by the poll loop before it moves on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("script generation failed: {0}")]
    Script(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("storage upload failed: {0}")]
    Storage(String),

    #[error("queue injection failed: {0}")]
    Injection(String),

    #[error("failed to acknowledge song {id}: {reason}")]
    Acknowledge { id: String, reason: String },

    #[error("malformed response body: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short stage name used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Http(_) | Error::Status { .. } => "transport",
            Error::Serialization(_) => "decode",
            Error::Catalog(_) => "fetch",
            Error::Script(_) => "script",
            Error::Synthesis(_) => "synthesis",
            Error::Storage(_) => "publish",
            Error::Injection(_) => "inject",
            Error::Acknowledge { .. } => "acknowledge",
        }
    }

    /// Re-labels a transport or decode failure as a failure of `stage`.
    ///
    /// Stage specific variants pass through untouched.
    pub fn in_stage(self, stage: fn(String) -> Error) -> Error {
        match self {
            Error::Http(_) | Error::Status { .. } | Error::Serialization(_) => {
                stage(self.to_string())
            }
            other => other,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_take_the_stage_label() {
        let err = Error::Status {
            status: 503,
            body: "busy".into(),
        }
        .in_stage(Error::Storage);
        assert_eq!(err.stage(), "publish");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn stage_errors_are_not_relabelled() {
        let err = Error::Synthesis("empty body".into()).in_stage(Error::Storage);
        assert_eq!(err.stage(), "synthesis");
    }

    #[test]
    fn decode_errors_keep_their_own_label() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = Error::from(decode).in_stage(Error::Catalog);
        assert_eq!(err.stage(), "fetch");
        assert!(err.to_string().contains("malformed response body"));
        assert!(!err.to_string().contains("transport"));
    }
}
