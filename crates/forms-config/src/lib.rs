//! Template engine configuration for form renderers
//!
//! Describes the template engines a host application configures (the
//! primary lookup source of a form renderer) and the backend preference of
//! the bundled standalone engine.
//!
//! Settings files are YAML and support two custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR` / `!env_var [VAR, default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use forms_config::FormsSettings;
//!
//! let settings = FormsSettings::load("/srv/app", "forms.yaml")?;
//! for engine in &settings.templates {
//!     println!("{} searches {:?}", engine.name(), engine.search_dirs(&settings.installed_apps));
//! }
//! ```

mod error;
mod loader;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use settings::{
    BackendKind, EngineOptions, EngineSettings, FormsSettings, StandaloneBackend,
    STANDALONE_BACKEND_ENV,
};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
