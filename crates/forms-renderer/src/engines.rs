//! Application-configured engines

use crate::engine::{build_engine, Engine, Template};
use crate::error::{TemplateDoesNotExist, TemplateError, TemplateResult};
use forms_config::FormsSettings;
use std::sync::Arc;
use tracing::{debug, trace};

/// Ordered list of the engines a host application configured
///
/// This is the primary lookup source of a [`crate::TemplateRenderer`].
#[derive(Default)]
pub struct Engines {
    engines: Vec<Arc<dyn Engine>>,
}

impl Engines {
    /// Build one engine per `templates` entry
    pub fn new(settings: &FormsSettings) -> TemplateResult<Self> {
        settings.validate()?;

        let engines = settings
            .templates
            .iter()
            .map(|engine| build_engine(engine, &settings.installed_apps))
            .collect::<TemplateResult<Vec<_>>>()?;

        debug!("Configured {} template engine(s)", engines.len());
        Ok(Self { engines })
    }

    pub fn from_engines(engines: Vec<Arc<dyn Engine>>) -> Self {
        Self { engines }
    }

    /// Engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.engines
            .iter()
            .find(|engine| engine.name() == name)
            .cloned()
    }

    pub fn all(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Try each engine in order
    ///
    /// Fails with a not-found error whose chain holds one failure per
    /// engine. Any other error stops the search.
    pub fn get_template(&self, name: &str) -> TemplateResult<Template> {
        let mut chain = Vec::with_capacity(self.engines.len());

        for engine in &self.engines {
            match engine.get_template(name) {
                Ok(template) => {
                    trace!("Engine '{}' found {}", engine.name(), name);
                    return Ok(template);
                }
                Err(TemplateError::DoesNotExist(missing)) => chain.push(missing),
                Err(e) => return Err(e),
            }
        }

        Err(TemplateDoesNotExist::new(name).with_chain(chain).into())
    }
}
