//! Jinja2-syntax engine backed by minijinja

use crate::engine::{find_template, Engine, Origin, RenderBackend, RenderContext, Template};
use crate::error::{TemplateDoesNotExist, TemplateError, TemplateResult};
use forms_config::{BackendKind, EngineOptions};
use minijinja::{AutoEscape, Environment, ErrorKind, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Engine for Jinja2 templates
///
/// Templates are loaded on first use through a loader that searches the
/// engine's directories in order, so `{% include %}` and `{% extends %}`
/// resolve exactly like top-level lookups.
pub struct Jinja2Engine {
    name: String,
    dirs: Vec<PathBuf>,
    inner: Arc<Jinja2Environment>,
}

struct Jinja2Environment {
    env: Environment<'static>,
}

impl Jinja2Engine {
    pub fn new(name: impl Into<String>, dirs: Vec<PathBuf>, options: &EngineOptions) -> Self {
        let name = name.into();
        let mut env = Environment::new();

        env.set_debug(options.debug);
        if !options.autoescape {
            env.set_auto_escape_callback(|_| AutoEscape::None);
        }

        let loader_dirs = dirs.clone();
        env.set_loader(move |template_name| load_source(&loader_dirs, template_name));

        debug!("Created jinja2 engine '{}' searching {:?}", name, dirs);

        Self {
            name,
            dirs,
            inner: Arc::new(Jinja2Environment { env }),
        }
    }
}

fn load_source(dirs: &[PathBuf], name: &str) -> Result<Option<String>, minijinja::Error> {
    match find_template(dirs, name) {
        Ok(path) => fs::read_to_string(&path).map(Some).map_err(|e| {
            minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("failed to read template {}", path.display()),
            )
            .with_source(e)
        }),
        Err(_) => Ok(None),
    }
}

impl Engine for Jinja2Engine {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Jinja2
    }

    fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn get_template(&self, name: &str) -> TemplateResult<Template> {
        let path = find_template(&self.dirs, name).map_err(|tried| {
            TemplateDoesNotExist::new(name)
                .with_engine(self.name.as_str())
                .with_tried(tried)
        })?;

        // Compile now so syntax errors surface at lookup time
        self.inner
            .env
            .get_template(name)
            .map_err(|e| TemplateError::from_minijinja(name, e))?;

        Ok(Template::new(
            Origin {
                name: path,
                template_name: name.to_string(),
                engine: self.name.clone(),
            },
            self.inner.clone(),
        ))
    }
}

impl RenderBackend for Jinja2Environment {
    fn render(&self, template_name: &str, context: &RenderContext) -> TemplateResult<String> {
        let template = self
            .env
            .get_template(template_name)
            .map_err(|e| TemplateError::from_minijinja(template_name, e))?;

        let mut ctx: BTreeMap<String, Value> = context
            .values
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
            .collect();
        if let Some(input) = &context.csrf_input {
            ctx.insert(
                "csrf_input".to_string(),
                Value::from_safe_string(input.clone()),
            );
        }

        template
            .render(Value::from(ctx))
            .map_err(|e| TemplateError::from_minijinja(template_name, e))
    }
}
