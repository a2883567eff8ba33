//! Form widget template renderer
//!
//! Resolves form widget templates against the template engines a host
//! application configured, falling back to a bundled set of widget
//! templates shipped with this crate.
//!
//! # Engines
//!
//! - `jinja2` - Jinja2 syntax, built on minijinja
//! - `django` - Django template syntax, built on tera
//!
//! The bundled templates live under [`ROOT`] in `jinja2/` and `templates/`,
//! one directory per backend, and cover the common widgets under
//! `django/forms/widgets/`.
//!
//! # Renderers
//!
//! - [`StandaloneTemplateRenderer`] - bundled templates only
//! - [`TemplateRenderer`] - configured engines first, then bundled templates
//!
//! When no source has a template, the error is
//! [`TemplateError::DoesNotExist`] and its chain records every failed
//! lookup in the order it was tried.
//!
//! # Example
//!
//! ```ignore
//! use forms_renderer::{FormRenderer, TemplateRenderer};
//! use forms_config::FormsSettings;
//! use serde_json::json;
//!
//! let settings = FormsSettings::load("/srv/app", "forms.yaml")?;
//! let renderer = TemplateRenderer::new(settings);
//!
//! let html = renderer.render(
//!     "django/forms/widgets/text.html",
//!     json!({"widget": {"name": "email", "attrs": {"required": true}}}),
//!     None,
//! )?;
//! ```

mod django;
mod engine;
mod engines;
mod error;
mod jinja2;
mod renderer;

pub use django::DjangoEngine;
pub use engine::{build_engine, Engine, Origin, RenderBackend, RenderContext, Request, Template};
pub use engines::Engines;
pub use error::{TemplateDoesNotExist, TemplateError, TemplateResult};
pub use jinja2::Jinja2Engine;
pub use renderer::{
    bundled_dir, standalone_engine, FormRenderer, StandaloneTemplateRenderer, TemplateRenderer,
    ROOT, STANDALONE_ENGINE_NAME,
};

// Re-export the settings types renderers are built from
pub use forms_config::{
    BackendKind, EngineOptions, EngineSettings, FormsSettings, StandaloneBackend,
    STANDALONE_BACKEND_ENV,
};
