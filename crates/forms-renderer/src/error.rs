//! Error types for template lookup and rendering

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A template could not be found
///
/// Engine-level failures carry the engine name and the paths that were
/// probed. Failures that combine several lookup sources carry the
/// underlying failures in `chain`, in the order the sources were tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDoesNotExist {
    /// Logical template name
    pub name: String,
    /// Engine that reported the failure
    pub engine: Option<String>,
    /// Paths that were probed
    pub tried: Vec<PathBuf>,
    /// Underlying failures
    pub chain: Vec<TemplateDoesNotExist>,
}

impl TemplateDoesNotExist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: None,
            tried: Vec::new(),
            chain: Vec::new(),
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_tried(mut self, tried: Vec<PathBuf>) -> Self {
        self.tried = tried;
        self
    }

    pub fn with_chain(mut self, chain: Vec<TemplateDoesNotExist>) -> Self {
        self.chain = chain;
        self
    }
}

impl fmt::Display for TemplateDoesNotExist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template does not exist: {}", self.name)?;
        if let Some(engine) = &self.engine {
            write!(f, " (engine '{}'", engine)?;
            if !self.tried.is_empty() {
                let tried: Vec<String> = self
                    .tried
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                write!(f, ", tried {}", tried.join(", "))?;
            }
            write!(f, ")")?;
        }
        for failure in &self.chain {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for TemplateDoesNotExist {}

/// Errors that can occur during template lookup and rendering
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No lookup source has the template
    #[error(transparent)]
    DoesNotExist(#[from] TemplateDoesNotExist),

    /// Invalid template syntax
    #[error("invalid template syntax in '{name}': {message}")]
    SyntaxError { name: String, message: String },

    /// Failed to render template
    #[error("failed to render template '{name}': {message}")]
    RenderError { name: String, message: String },

    /// Context is not a mapping
    #[error("invalid template context: {message}")]
    InvalidContext { message: String },

    /// IO error reading template file
    #[error("failed to read template from {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid engine configuration
    #[error(transparent)]
    Config(#[from] forms_config::ConfigError),
}

impl TemplateError {
    /// The not-found failure, if this is one
    pub fn as_does_not_exist(&self) -> Option<&TemplateDoesNotExist> {
        match self {
            TemplateError::DoesNotExist(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn from_minijinja(name: &str, err: minijinja::Error) -> Self {
        let name = err.name().unwrap_or(name).to_string();
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => TemplateError::SyntaxError {
                name,
                message: err.to_string(),
            },
            minijinja::ErrorKind::TemplateNotFound => {
                TemplateError::DoesNotExist(TemplateDoesNotExist::new(name))
            }
            _ => TemplateError::RenderError {
                name,
                message: error_chain(&err),
            },
        }
    }

    pub(crate) fn from_tera(name: &str, err: tera::Error) -> Self {
        let message = error_chain(&err);
        match err.kind {
            tera::ErrorKind::TemplateNotFound(missing) => {
                TemplateError::DoesNotExist(TemplateDoesNotExist::new(missing))
            }
            _ => TemplateError::RenderError {
                name: name.to_string(),
                message,
            },
        }
    }
}

/// Join an error and its sources into one message
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
