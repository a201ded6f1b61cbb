use miette::Diagnostic;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Diagnostic, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    #[diagnostic(code(outpost::io))]
    IoError(#[from] std::io::Error),

    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(outpost::io))]
    Io {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Parse error: {message}")]
    #[diagnostic(code(outpost::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Config error in {name}: field `{field}` {reason}")]
    #[diagnostic(code(outpost::config))]
    Config {
        name: String,
        field: String,
        reason: String,
    },

    #[error("Resolution error: no {kind} named `{name}`")]
    #[diagnostic(code(outpost::resolve))]
    Resolution { kind: String, name: String },

    #[error("Image error: {message}")]
    #[diagnostic(code(outpost::image))]
    Image { message: String },

    #[error("Pack error: {message}")]
    #[diagnostic(code(outpost::pack))]
    Pack { message: String },

    #[error("Encoding error: {message}")]
    #[diagnostic(code(outpost::encode))]
    Encoding { message: String },

    #[error("Cache error: {message}")]
    #[diagnostic(code(outpost::cache))]
    Cache { message: String },

    #[error("Build error: {message}")]
    #[diagnostic(code(outpost::build))]
    Build {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl DataError {
    pub fn config(
        name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DataError::Config {
            name: name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn resolution(kind: impl Into<String>, name: impl Into<String>) -> Self {
        DataError::Resolution {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn image(message: impl Into<String>) -> Self {
        DataError::Image {
            message: message.into(),
        }
    }

    pub fn pack(message: impl Into<String>) -> Self {
        DataError::Pack {
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        DataError::Encoding {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<std::path::PathBuf>, message: impl Into<String>) -> Self {
        DataError::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code matching the `#[diagnostic(code)]` attribute.
    pub fn code(&self) -> &'static str {
        match self {
            DataError::IoError(_) | DataError::Io { .. } => "outpost::io",
            DataError::Parse { .. } => "outpost::parse",
            DataError::Config { .. } => "outpost::config",
            DataError::Resolution { .. } => "outpost::resolve",
            DataError::Image { .. } => "outpost::image",
            DataError::Pack { .. } => "outpost::pack",
            DataError::Encoding { .. } => "outpost::encode",
            DataError::Cache { .. } => "outpost::cache",
            DataError::Build { .. } => "outpost::build",
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
