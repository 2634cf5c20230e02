use crate::ingest::coerce::CoerceError;
use thiserror::Error;

/// Coarse classification of a [`LoadError`], independent of context labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    StreamAcquisition,
    Parse,
    UnsupportedType,
    Schema,
    Write,
    Internal,
}

/// Every failure the loader can report.
///
/// Stages never recover from a lower stage's error. They wrap it with a static
/// label through [`Context::context`] and hand it upwards, so the message that
/// reaches `main` reads like `error: load: error: decode row: line 4, ...`.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required setting is missing or invalid.
    #[error("{0}")]
    Configuration(String),

    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("cannot open {location}: {reason}")]
    StreamAcquisition { location: String, reason: String },

    #[error("failed reading input stream: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("failed reading row: {0}")]
    Read(#[from] csv::Error),

    #[error("line {line}: {message}")]
    MalformedRow { line: u64, message: &'static str },

    #[error("{0}")]
    Schema(String),

    #[error("line {line}, column {column:?}: {source}")]
    Coerce {
        line: u64,
        column: String,
        #[source]
        source: CoerceError,
    },

    /// The destination rejected the batch or could not be reached.
    #[error("destination rejected write: {0}")]
    Write(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("load task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{label}: {source}")]
    Context {
        label: &'static str,
        #[source]
        source: Box<LoadError>,
    },
}

impl LoadError {
    pub fn config(message: impl Into<String>) -> Self {
        LoadError::Configuration(message.into())
    }

    pub fn write(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        LoadError::Write(err.into())
    }

    /// The innermost error, with all context labels stripped.
    pub fn root(&self) -> &LoadError {
        match self {
            LoadError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            LoadError::Configuration(_) | LoadError::Settings(_) => ErrorKind::Configuration,
            LoadError::StreamAcquisition { .. } | LoadError::StreamRead(_) => {
                ErrorKind::StreamAcquisition
            }
            LoadError::Read(_) | LoadError::MalformedRow { .. } => ErrorKind::Parse,
            LoadError::Coerce { source, .. } => match source {
                CoerceError::Parse { .. } => ErrorKind::Parse,
                CoerceError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            },
            LoadError::Schema(_) => ErrorKind::Schema,
            LoadError::Write(_) => ErrorKind::Write,
            LoadError::Task(_) | LoadError::Context { .. } => ErrorKind::Internal,
        }
    }
}

/// Attaches a static stage label to an error on its way up.
pub trait Context<T> {
    fn context(self, label: &'static str) -> Result<T, LoadError>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: Into<LoadError>,
{
    fn context(self, label: &'static str) -> Result<T, LoadError> {
        self.map_err(|err| LoadError::Context {
            label,
            source: Box::new(err.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::schema::ColumnType;

    #[test]
    fn context_prefixes_message_and_keeps_kind() {
        let result: Result<(), LoadError> = Err(LoadError::Schema("row too short".into()));
        let err = result
            .context("error: decode row")
            .context("error: load")
            .unwrap_err();

        assert_eq!(err.to_string(), "error: load: error: decode row: row too short");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(matches!(err.root(), LoadError::Schema(_)));
    }

    #[test]
    fn coerce_errors_classify_by_cause() {
        let parse = LoadError::Coerce {
            line: 3,
            column: "ColA".into(),
            source: CoerceError::Parse {
                type_tag: ColumnType::Int64,
                raw: "foo".into(),
                reason: "invalid digit found in string".into(),
            },
        };
        let unsupported = LoadError::Coerce {
            line: 2,
            column: "ColA".into(),
            source: CoerceError::UnsupportedType("int32".into()),
        };

        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert_eq!(unsupported.kind(), ErrorKind::UnsupportedType);
    }
}
