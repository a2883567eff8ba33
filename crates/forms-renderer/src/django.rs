//! Django-syntax engine backed by tera

use crate::engine::{
    candidate_paths, normalize_template_name, Engine, Origin, RenderBackend, RenderContext,
    Template,
};
use crate::error::{error_chain, TemplateDoesNotExist, TemplateError, TemplateResult};
use forms_config::{BackendKind, EngineOptions};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::Tera;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Engine for Django-syntax templates
///
/// tera resolves `{% include %}` and `{% extends %}` only among templates it
/// already knows, so every file under the engine's directories is indexed
/// when the engine is built. When two directories hold the same template
/// name, the earlier directory wins.
///
/// Each file is parsed on its own. A file that fails to parse, or that
/// extends or imports one that did, is kept out of tera and reported only
/// when it is looked up or included.
pub struct DjangoEngine {
    name: String,
    dirs: Vec<PathBuf>,
    origins: HashMap<String, PathBuf>,
    inner: Arc<TeraEnvironment>,
}

struct TeraEnvironment {
    tera: Tera,
    /// Template name -> why it could not be loaded
    broken: HashMap<String, String>,
}

impl DjangoEngine {
    pub fn new(
        name: impl Into<String>,
        dirs: Vec<PathBuf>,
        options: &EngineOptions,
    ) -> TemplateResult<Self> {
        let name = name.into();
        let mut origins = HashMap::new();
        let mut parsed = HashMap::new();
        let mut broken = HashMap::new();

        for dir in &dirs {
            if !dir.is_dir() {
                trace!("Skipping missing template directory {:?}", dir);
                continue;
            }

            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|e| TemplateError::IoError {
                    path: dir.clone(),
                    source: io::Error::from(e),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let Some(template_name) = template_name_for(dir, entry.path()) else {
                    continue;
                };
                if origins.contains_key(&template_name) {
                    continue;
                }

                let source = match fs::read_to_string(entry.path()) {
                    Ok(source) => source,
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                        trace!("Skipping non-UTF-8 file {:?}", entry.path());
                        continue;
                    }
                    Err(e) => {
                        return Err(TemplateError::IoError {
                            path: entry.path().to_path_buf(),
                            source: e,
                        })
                    }
                };

                origins.insert(template_name.clone(), entry.path().to_path_buf());
                match tera::Template::new(&template_name, None, &source) {
                    Ok(template) => {
                        parsed.insert(template_name, (template, source));
                    }
                    Err(e) => {
                        trace!("Failed to parse {:?}: {}", entry.path(), e);
                        broken.insert(template_name, error_chain(&e));
                    }
                }
            }
        }

        drop_unresolved(&mut parsed, &mut broken);

        let mut tera = new_tera(options);
        if let Err(e) = tera.add_raw_templates(
            parsed
                .iter()
                .map(|(template_name, (_, source))| (template_name, source)),
        ) {
            let message = error_chain(&e);
            for template_name in parsed.keys() {
                broken.insert(template_name.clone(), message.clone());
            }
            tera = new_tera(options);
        }

        debug!(
            "Created django engine '{}' with {} template(s) from {:?} ({} unusable)",
            name,
            origins.len(),
            dirs,
            broken.len()
        );

        Ok(Self {
            name,
            dirs,
            origins,
            inner: Arc::new(TeraEnvironment { tera, broken }),
        })
    }
}

fn new_tera(options: &EngineOptions) -> Tera {
    let mut tera = Tera::default();
    if !options.autoescape {
        tera.autoescape_on(Vec::new());
    }
    tera
}

/// Move templates whose `extends` or macro imports cannot be satisfied from
/// `parsed` to `broken`, until every remaining dependency is present
fn drop_unresolved(
    parsed: &mut HashMap<String, (tera::Template, String)>,
    broken: &mut HashMap<String, String>,
) {
    loop {
        let current: &HashMap<_, _> = parsed;
        let unresolved: Vec<(String, String)> = current
            .iter()
            .filter_map(|(template_name, (template, _))| {
                if extends_cycle(current, template_name) {
                    return Some((template_name.clone(), "circular extends".to_string()));
                }
                let mut deps = template
                    .parent
                    .iter()
                    .chain(template.imported_macro_files.iter().map(|(file, _)| file));
                deps.find(|dep| !current.contains_key(dep.as_str()))
                    .map(|dep| {
                        let reason = match broken.get(dep.as_str()) {
                            Some(message) => format!("depends on '{}': {}", dep, message),
                            None => format!("depends on missing template '{}'", dep),
                        };
                        (template_name.clone(), reason)
                    })
            })
            .collect();

        if unresolved.is_empty() {
            return;
        }
        for (template_name, reason) in unresolved {
            parsed.remove(&template_name);
            broken.insert(template_name, reason);
        }
    }
}

/// Whether following `extends` from `start` ever revisits a template
fn extends_cycle(parsed: &HashMap<String, (tera::Template, String)>, start: &str) -> bool {
    let mut seen = HashSet::new();
    let mut current = start;
    seen.insert(current);
    while let Some(parent) = parsed
        .get(current)
        .and_then(|(template, _)| template.parent.as_deref())
    {
        if !seen.insert(parent) {
            return true;
        }
        current = parent;
    }
    false
}

/// `/`-joined name of `path` relative to `dir`, `None` for non-UTF-8 paths
fn template_name_for(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    Some(parts?.join("/"))
}

impl Engine for DjangoEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Django
    }

    fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn get_template(&self, name: &str) -> TemplateResult<Template> {
        let found = normalize_template_name(name)
            .and_then(|key| self.origins.get(&key).map(|path| (key, path.clone())));

        match found {
            Some((key, _)) if self.inner.broken.contains_key(&key) => {
                Err(TemplateError::SyntaxError {
                    message: self.inner.broken[&key].clone(),
                    name: key,
                })
            }
            Some((key, path)) => Ok(Template::new(
                Origin {
                    name: path,
                    template_name: key,
                    engine: self.name.clone(),
                },
                self.inner.clone(),
            )),
            None => Err(TemplateDoesNotExist::new(name)
                .with_engine(self.name.as_str())
                .with_tried(candidate_paths(&self.dirs, name))
                .into()),
        }
    }
}

impl RenderBackend for TeraEnvironment {
    fn render(&self, template_name: &str, context: &RenderContext) -> TemplateResult<String> {
        let mut ctx = tera::Context::from_value(JsonValue::Object(context.values.clone()))
            .map_err(|e| TemplateError::InvalidContext {
                message: error_chain(&e),
            })?;
        if let Some(input) = &context.csrf_input {
            ctx.insert("csrf_input", input);
        }

        self.tera.render(template_name, &ctx).map_err(|e| {
            self.broken_include(&e)
                .unwrap_or_else(|| TemplateError::from_tera(template_name, e))
        })
    }
}

impl TeraEnvironment {
    /// The load failure of an included template that tera reported as missing
    fn broken_include(&self, err: &tera::Error) -> Option<TemplateError> {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(cause) = current {
            if let Some(tera::ErrorKind::TemplateNotFound(names)) =
                cause.downcast_ref::<tera::Error>().map(|e| &e.kind)
            {
                let names = names.trim_start_matches('[').trim_end_matches(']');
                for included in names.split(", ") {
                    if let Some(message) = self.broken.get(included) {
                        return Some(TemplateError::SyntaxError {
                            name: included.to_string(),
                            message: message.clone(),
                        });
                    }
                }
            }
            current = cause.source();
        }
        None
    }
}
