//! Form renderers
//!
//! [`StandaloneTemplateRenderer`] renders with the bundled widget templates
//! only. [`TemplateRenderer`] looks in the application-configured engines
//! first and falls back to the bundled templates.

use crate::engine::{build_engine, Engine, Request, Template};
use crate::engines::Engines;
use crate::error::{TemplateDoesNotExist, TemplateError, TemplateResult};
use forms_config::{BackendKind, EngineSettings, FormsSettings, StandaloneBackend};
use serde::Serialize;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Install directory of this crate, holding the bundled `jinja2/` and
/// `templates/` directories
pub const ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Name of the bundled standalone engine
pub const STANDALONE_ENGINE_NAME: &str = "djangoforms";

/// Bundled template directory for `backend`
pub fn bundled_dir(backend: BackendKind) -> PathBuf {
    Path::new(ROOT).join(backend.subdir())
}

/// Build an engine over the bundled templates
pub fn standalone_engine(backend: BackendKind) -> TemplateResult<Arc<dyn Engine>> {
    let settings = EngineSettings::new(backend)
        .with_name(STANDALONE_ENGINE_NAME)
        .with_dir(bundled_dir(backend));
    build_engine(&settings, &[])
}

/// Resolves and renders form templates
pub trait FormRenderer {
    /// Resolve `name` against this renderer's lookup sources
    fn get_template(&self, name: &str) -> TemplateResult<Template>;

    /// Render `name` and trim surrounding whitespace
    fn render(
        &self,
        name: &str,
        context: impl Serialize,
        request: Option<&Request>,
    ) -> TemplateResult<String>
    where
        Self: Sized,
    {
        let template = self.get_template(name)?;
        let output = template.render(context, request)?;
        Ok(output.trim().to_string())
    }
}

/// Render using only the bundled templates
///
/// The engine is built on first use and reused for the renderer's lifetime.
pub struct StandaloneTemplateRenderer {
    preference: StandaloneBackend,
    engine: OnceCell<Arc<dyn Engine>>,
}

impl StandaloneTemplateRenderer {
    /// Renderer whose backend comes from `FORMS_STANDALONE_BACKEND`,
    /// defaulting to Jinja2
    pub fn new() -> Self {
        Self::with_preference(StandaloneBackend::Auto)
    }

    /// Renderer pinned to one backend
    pub fn with_backend(backend: BackendKind) -> Self {
        let preference = match backend {
            BackendKind::Jinja2 => StandaloneBackend::Jinja2,
            BackendKind::Django => StandaloneBackend::Django,
        };
        Self::with_preference(preference)
    }

    pub fn with_preference(preference: StandaloneBackend) -> Self {
        Self {
            preference,
            engine: OnceCell::new(),
        }
    }

    /// The memoized bundled engine
    pub fn standalone_engine(&self) -> TemplateResult<Arc<dyn Engine>> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine.clone());
        }

        let backend = self.resolve_backend()?;
        let engine = standalone_engine(backend)?;
        debug!("Using bundled {} templates from {}", backend, ROOT);

        Ok(self.engine.get_or_init(|| engine).clone())
    }

    fn resolve_backend(&self) -> TemplateResult<BackendKind> {
        match self.preference {
            StandaloneBackend::Auto => Ok(StandaloneBackend::from_env()?
                .map(StandaloneBackend::resolve)
                .unwrap_or(BackendKind::Jinja2)),
            explicit => Ok(explicit.resolve()),
        }
    }
}

impl Default for StandaloneTemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FormRenderer for StandaloneTemplateRenderer {
    fn get_template(&self, name: &str) -> TemplateResult<Template> {
        self.standalone_engine()?.get_template(name)
    }
}

/// Render via the configured engines first, then the bundled templates
pub struct TemplateRenderer {
    settings: FormsSettings,
    engines: OnceCell<Engines>,
    standalone: StandaloneTemplateRenderer,
}

impl TemplateRenderer {
    pub fn new(settings: FormsSettings) -> Self {
        let standalone =
            StandaloneTemplateRenderer::with_preference(settings.standalone_backend);
        Self {
            settings,
            engines: OnceCell::new(),
            standalone,
        }
    }

    /// Renderer over already-built engines
    pub fn with_engines(engines: Engines, standalone: StandaloneTemplateRenderer) -> Self {
        Self {
            settings: FormsSettings::default(),
            engines: OnceCell::from(engines),
            standalone,
        }
    }

    /// Load settings from a YAML file and build a renderer from them
    pub fn from_config(
        config_dir: impl AsRef<Path>,
        file: impl AsRef<Path>,
    ) -> TemplateResult<Self> {
        let settings = FormsSettings::load(config_dir, file)?;
        Ok(Self::new(settings))
    }

    /// The memoized configured engines
    pub fn engines(&self) -> TemplateResult<&Engines> {
        if let Some(engines) = self.engines.get() {
            return Ok(engines);
        }

        let engines = Engines::new(&self.settings)?;
        Ok(self.engines.get_or_init(|| engines))
    }

    /// The bundled fallback renderer
    pub fn standalone(&self) -> &StandaloneTemplateRenderer {
        &self.standalone
    }
}

impl FormRenderer for TemplateRenderer {
    fn get_template(&self, name: &str) -> TemplateResult<Template> {
        let primary = match self.engines()?.get_template(name) {
            Ok(template) => return Ok(template),
            Err(TemplateError::DoesNotExist(missing)) => missing,
            Err(e) => return Err(e),
        };

        debug!("{} not found in configured engines, using bundled templates", name);

        match self.standalone.get_template(name) {
            Ok(template) => Ok(template),
            Err(TemplateError::DoesNotExist(fallback)) => {
                let mut chain = primary.chain;
                chain.push(fallback);
                Err(TemplateDoesNotExist::new(name).with_chain(chain).into())
            }
            Err(e) => Err(e),
        }
    }
}
