//! Engine abstraction and template handles
//!
//! An [`Engine`] locates named templates in an ordered list of directories
//! and returns [`Template`] handles that render with a context and an
//! optional [`Request`].

use crate::error::{TemplateError, TemplateResult};
use forms_config::{BackendKind, EngineSettings};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// A templating backend capable of locating named templates
pub trait Engine: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Template syntax this engine understands
    fn backend(&self) -> BackendKind;

    /// Directories searched, in order
    fn dirs(&self) -> &[PathBuf];

    /// Locate and compile a template
    fn get_template(&self, name: &str) -> TemplateResult<Template>;
}

/// Build the engine described by `settings`
pub fn build_engine(
    settings: &EngineSettings,
    installed_apps: &[PathBuf],
) -> TemplateResult<Arc<dyn Engine>> {
    let dirs = settings.search_dirs(installed_apps);
    let engine: Arc<dyn Engine> = match settings.backend {
        BackendKind::Jinja2 => Arc::new(crate::jinja2::Jinja2Engine::new(
            settings.name(),
            dirs,
            &settings.options,
        )),
        BackendKind::Django => Arc::new(crate::django::DjangoEngine::new(
            settings.name(),
            dirs,
            &settings.options,
        )?),
    };
    Ok(engine)
}

/// Where a template was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Absolute path of the template file
    pub name: PathBuf,
    /// Logical template name
    pub template_name: String,
    /// Name of the engine that loaded it
    pub engine: String,
}

/// The part of an HTTP request visible to templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Request {
    pub method: String,
    pub path: String,
    #[serde(skip)]
    pub csrf_token: Option<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            csrf_token: None,
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }
}

/// Context handed to a backend at render time
pub struct RenderContext {
    /// Plain context variables, including `request` and `csrf_token`
    pub values: Map<String, JsonValue>,
    /// Pre-rendered hidden CSRF input, exposed as the safe `csrf_input` variable
    pub csrf_input: Option<String>,
}

impl RenderContext {
    pub fn new(context: impl Serialize, request: Option<&Request>) -> TemplateResult<Self> {
        let mut values = match serde_json::to_value(context) {
            Ok(JsonValue::Object(map)) => map,
            Ok(JsonValue::Null) => Map::new(),
            Ok(other) => {
                return Err(TemplateError::InvalidContext {
                    message: format!("expected a mapping, got {}", json_type(&other)),
                })
            }
            Err(e) => {
                return Err(TemplateError::InvalidContext {
                    message: e.to_string(),
                })
            }
        };

        let mut csrf_input = None;
        if let Some(request) = request {
            let request_value =
                serde_json::to_value(request).map_err(|e| TemplateError::InvalidContext {
                    message: e.to_string(),
                })?;
            values.insert("request".to_string(), request_value);

            if let Some(token) = &request.csrf_token {
                values.insert("csrf_token".to_string(), JsonValue::from(token.as_str()));
                csrf_input = Some(format!(
                    r#"<input type="hidden" name="csrfmiddlewaretoken" value="{}">"#,
                    escape_attr(token)
                ));
            }
        }

        Ok(Self { values, csrf_input })
    }
}

/// Renders compiled templates of one engine
pub trait RenderBackend: Send + Sync {
    fn render(&self, template_name: &str, context: &RenderContext) -> TemplateResult<String>;
}

/// Opaque handle to a located template
#[derive(Clone)]
pub struct Template {
    origin: Origin,
    backend: Arc<dyn RenderBackend>,
}

impl Template {
    pub fn new(origin: Origin, backend: Arc<dyn RenderBackend>) -> Self {
        Self { origin, backend }
    }

    /// Where this template was loaded from
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Logical template name
    pub fn name(&self) -> &str {
        &self.origin.template_name
    }

    /// Render with the given context and optional request
    pub fn render(
        &self,
        context: impl Serialize,
        request: Option<&Request>,
    ) -> TemplateResult<String> {
        let context = RenderContext::new(context, request)?;
        trace!("Rendering template {:?}", self.origin.name);
        self.backend.render(&self.origin.template_name, &context)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Candidate paths for `name` under each directory
///
/// Empty when `name` is absolute or climbs out of the directory.
pub(crate) fn candidate_paths(dirs: &[PathBuf], name: &str) -> Vec<PathBuf> {
    match relative_template_path(name) {
        Some(relative) => dirs.iter().map(|dir| dir.join(&relative)).collect(),
        None => Vec::new(),
    }
}

/// First existing file for `name`, or every path that was tried
pub(crate) fn find_template(dirs: &[PathBuf], name: &str) -> Result<PathBuf, Vec<PathBuf>> {
    let candidates = candidate_paths(dirs, name);
    for candidate in &candidates {
        trace!("Probing template path {:?}", candidate);
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    Err(candidates)
}

/// `/`-joined normal form of `name`, `None` when it is absolute or climbs out
pub(crate) fn normalize_template_name(name: &str) -> Option<String> {
    let relative = relative_template_path(name)?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    parts.map(|parts| parts.join("/"))
}

fn relative_template_path(name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.starts_with('/') || name.starts_with('\\') {
        return None;
    }

    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "mapping",
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
