use std::error::Error as StdError;

use thiserror::Error;

/// Boxed cause attached to transport and unexpected failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Format errors: malformed input detected at parse or build time.
///
/// These never depend on a backend and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid reference '{value}', expected 1 to 3 comma-separated components")]
    InvalidRef { value: String },
    #[error("reference id cannot be empty: '{value}'")]
    EmptyRefId { value: String },

    #[error("invalid key '{value}': {reason}")]
    InvalidKey { value: String, reason: String },

    #[error("invalid url '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },
    #[error("invalid uri '{value}': {reason}")]
    InvalidUri { value: String, reason: String },

    #[error("invalid structure '{structure}': {reason}")]
    InvalidStructure { structure: String, reason: String },
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("source name cannot be blank")]
    BlankSourceName,
    #[error("source '{name}' does not declare a driver")]
    BlankDriver { name: String },
    #[error("invalid value '{value}' for property '{key}'")]
    InvalidProperty { key: String, value: String },
    #[error("invalid source descriptor: {reason}")]
    InvalidDescriptor { reason: String },
}

/// Error classification used by callers to branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdmxErrorKind {
    /// Bad input; see [`ValidationError`].
    InvalidArgument,
    /// Unknown source, no accepting driver, absent flow or structure.
    NotFound,
    /// Transport, malformed stream or backend failure.
    Io,
    /// Cursor or connection used outside its valid state.
    IllegalState,
    /// Fault not yet normalized by a failsafe boundary.
    Unexpected,
}

/// The single error channel of the engine.
#[derive(Debug, Error)]
pub enum SdmxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("illegal state: {message}")]
    IllegalState { message: String },

    #[error("unexpected failure: {message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl SdmxError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    pub fn io_caused_by(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    pub const fn kind(&self) -> SdmxErrorKind {
        match self {
            Self::Validation(_) => SdmxErrorKind::InvalidArgument,
            Self::NotFound { .. } => SdmxErrorKind::NotFound,
            Self::Io { .. } => SdmxErrorKind::Io,
            Self::IllegalState { .. } => SdmxErrorKind::IllegalState,
            Self::Unexpected { .. } => SdmxErrorKind::Unexpected,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind() {
            SdmxErrorKind::InvalidArgument => "sdmx.invalid_argument",
            SdmxErrorKind::NotFound => "sdmx.not_found",
            SdmxErrorKind::Io => "sdmx.io",
            SdmxErrorKind::IllegalState => "sdmx.illegal_state",
            SdmxErrorKind::Unexpected => "sdmx.unexpected",
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Only transport failures are worth another attempt.
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

impl From<std::io::Error> for SdmxError {
    fn from(error: std::io::Error) -> Self {
        Self::io_caused_by(format!("i/o failure: {error}"), error)
    }
}

impl From<quick_xml::Error> for SdmxError {
    fn from(error: quick_xml::Error) -> Self {
        Self::io_caused_by(format!("malformed xml stream: {error}"), error)
    }
}

impl From<quick_xml::events::attributes::AttrError> for SdmxError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        Self::io_caused_by(format!("malformed xml attribute: {error}"), error)
    }
}
