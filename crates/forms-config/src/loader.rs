//! YAML loader with custom tag support
//!
//! Settings files may use two custom tags:
//! - `!include path` - Include another YAML file, relative to the including file
//! - `!env_var VAR` or `!env_var [VAR, default]` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that expands `!include` and `!env_var` tags
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a new YAML loader for the given config directory
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed_value = self.process_value(v, source_path)?;
                    result.insert(k, processed_value);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        let value = tagged.value;

        trace!("Processing tag '{}' with value {:?}", tag, value);

        match tag.as_str() {
            "!include" => self.process_include(value, source_path),
            "!env_var" => self.process_env_var(value),
            _ => {
                // Unknown tags are kept so serde can report them against the typed settings
                let processed = self.process_value(value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value: processed,
                })))
            }
        }
    }

    fn process_include(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        let include_path = self.value_to_path(&value, source_path)?;
        debug!("Including file: {:?}", include_path);
        self.load_file(&include_path)
    }

    /// Process !env_var tag, with an optional default as the second list item
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let (var_name, default) = match value {
            Value::String(s) => (s, None),
            Value::Sequence(seq) if seq.len() == 2 => {
                let mut items = seq.into_iter();
                match (items.next(), items.next()) {
                    (Some(Value::String(name)), Some(default)) => (name, Some(default)),
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: "!env_var".to_string(),
                            reason: "expected [NAME, default]".to_string(),
                        })
                    }
                }
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "!env_var".to_string(),
                    reason: "environment variable name must be a string".to_string(),
                })
            }
        };

        match std::env::var(&var_name) {
            Ok(env_value) => {
                debug!("Substituted env var: {}", var_name);
                Ok(Value::String(env_value))
            }
            Err(_) => default.ok_or(ConfigError::EnvVarNotFound { var: var_name }),
        }
    }

    /// Convert a YAML value to a path, resolving relative to source file
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            Value::String(s) => s.clone(),
            _ => {
                return Err(ConfigError::InvalidIncludePath {
                    path: format!("{:?}", value),
                    reason: "path must be a string".to_string(),
                })
            }
        };

        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        let resolved = if Path::new(&path_str).is_absolute() {
            PathBuf::from(&path_str)
        } else {
            base_dir.join(&path_str)
        };

        Ok(resolved)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Load a YAML file with full tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir);
    loader.load_file(file)
}

/// Load a YAML string with tag processing
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let config_dir = config_dir.into();
    let source_path = config_dir.join(source_name);
    let mut loader = YamlLoader::new(config_dir);
    loader.load_string(content, &source_path)
}
