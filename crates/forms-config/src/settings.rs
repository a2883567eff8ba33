//! Template engine settings
//!
//! Describes the engines a host application configures for form rendering,
//! the installed applications whose template directories may be searched,
//! and which backend the bundled standalone engine should use.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{load_yaml, load_yaml_string};

/// Environment variable that overrides the standalone backend preference
pub const STANDALONE_BACKEND_ENV: &str = "FORMS_STANDALONE_BACKEND";

/// Templating backend of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Jinja2 syntax
    Jinja2,
    /// Django template syntax
    Django,
}

impl BackendKind {
    /// Subdirectory holding this backend's templates, both in the bundled
    /// template set and inside installed applications
    pub fn subdir(&self) -> &'static str {
        match self {
            BackendKind::Jinja2 => "jinja2",
            BackendKind::Django => "templates",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Jinja2 => "jinja2",
            BackendKind::Django => "django",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jinja2" => Ok(BackendKind::Jinja2),
            "django" => Ok(BackendKind::Django),
            other => Err(ConfigError::InvalidValue {
                key: "backend".to_string(),
                reason: format!("unknown backend '{}'", other),
            }),
        }
    }
}

/// Backend preference for the bundled standalone engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandaloneBackend {
    /// Prefer Jinja2
    #[default]
    Auto,
    Jinja2,
    Django,
}

impl StandaloneBackend {
    /// The backend this preference selects
    pub fn resolve(self) -> BackendKind {
        match self {
            StandaloneBackend::Auto | StandaloneBackend::Jinja2 => BackendKind::Jinja2,
            StandaloneBackend::Django => BackendKind::Django,
        }
    }

    /// Read the preference from [`STANDALONE_BACKEND_ENV`]
    pub fn from_env() -> ConfigResult<Option<Self>> {
        Self::from_env_var(STANDALONE_BACKEND_ENV)
    }

    /// Read the preference from the named environment variable, `None` when unset
    pub fn from_env_var(var: &str) -> ConfigResult<Option<Self>> {
        match std::env::var(var) {
            Ok(value) => value.parse().map(Some),
            Err(_) => Ok(None),
        }
    }
}

impl FromStr for StandaloneBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(StandaloneBackend::Auto),
            "jinja2" => Ok(StandaloneBackend::Jinja2),
            "django" => Ok(StandaloneBackend::Django),
            other => Err(ConfigError::InvalidValue {
                key: "standalone_backend".to_string(),
                reason: format!("expected auto, jinja2 or django, got '{}'", other),
            }),
        }
    }
}

/// Backend options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Escape HTML in `.html` templates
    #[serde(default = "default_true")]
    pub autoescape: bool,

    /// Keep debug information for template errors
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            autoescape: true,
            debug: false,
        }
    }
}

/// One entry of the `templates` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Templating backend
    pub backend: BackendKind,

    /// Engine name, defaults to the backend name
    #[serde(default)]
    pub name: Option<String>,

    /// Directories searched in order
    #[serde(default)]
    pub dirs: Vec<PathBuf>,

    /// Also search the backend subdirectory of each installed application
    #[serde(default)]
    pub app_dirs: bool,

    #[serde(default)]
    pub options: EngineOptions,
}

impl EngineSettings {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            name: None,
            dirs: Vec::new(),
            app_dirs: false,
            options: EngineOptions::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    pub fn with_app_dirs(mut self, app_dirs: bool) -> Self {
        self.app_dirs = app_dirs;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Engine name
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.backend.as_str())
    }

    /// Ordered directories this engine searches: `dirs` first, then the
    /// backend subdirectory of each installed application when `app_dirs` is set
    pub fn search_dirs(&self, installed_apps: &[PathBuf]) -> Vec<PathBuf> {
        let mut dirs = self.dirs.clone();
        if self.app_dirs {
            dirs.extend(
                installed_apps
                    .iter()
                    .map(|app| app.join(self.backend.subdir())),
            );
        }
        dirs
    }
}

/// Form rendering settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormsSettings {
    /// Root directories of installed applications
    #[serde(default)]
    pub installed_apps: Vec<PathBuf>,

    /// Backend of the bundled standalone engine
    #[serde(default)]
    pub standalone_backend: StandaloneBackend,

    /// Application-configured engines, tried in order
    #[serde(default)]
    pub templates: Vec<EngineSettings>,
}

impl FormsSettings {
    /// Load settings from a YAML file inside `config_dir`
    pub fn load(config_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let file = file.as_ref();
        let yaml = load_yaml(config_dir, file)?;
        let path = config_dir.join(file);
        let base_dir = path.parent().unwrap_or(config_dir);
        Self::from_yaml(yaml, base_dir)
    }

    /// Parse settings from a YAML string; relative paths resolve against `base_dir`
    pub fn from_yaml_str(content: &str, base_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let base_dir = base_dir.as_ref();
        let yaml = load_yaml_string(base_dir, content, "<string>")?;
        Self::from_yaml(yaml, base_dir)
    }

    /// Build settings from an already-processed YAML value
    pub fn from_yaml(yaml: Value, base_dir: &Path) -> ConfigResult<Self> {
        if yaml.is_null() {
            return Ok(Self::default());
        }
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "settings must be a mapping".to_string(),
            });
        }

        let mut settings: Self =
            serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: e.to_string(),
            })?;
        settings.resolve_paths(base_dir);
        settings.validate()?;

        debug!(
            "Loaded form settings with {} engine(s), standalone backend {:?}",
            settings.templates.len(),
            settings.standalone_backend
        );
        Ok(settings)
    }

    pub fn with_engine(mut self, engine: EngineSettings) -> Self {
        self.templates.push(engine);
        self
    }

    pub fn with_installed_app(mut self, app: impl Into<PathBuf>) -> Self {
        self.installed_apps.push(app.into());
        self
    }

    pub fn with_standalone_backend(mut self, backend: StandaloneBackend) -> Self {
        self.standalone_backend = backend;
        self
    }

    /// Check that engine names are unique
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for engine in &self.templates {
            if !seen.insert(engine.name()) {
                return Err(ConfigError::ValidationFailed {
                    message: format!(
                        "template engine aliases aren't unique, duplicate: {}",
                        engine.name()
                    ),
                });
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };
        self.installed_apps.iter_mut().for_each(resolve);
        for engine in &mut self.templates {
            engine.dirs.iter_mut().for_each(resolve);
        }
    }
}
