//! Template lookup tests for the standalone and fallback renderers

mod common;

use common::{fixtures_dir, init_tracing, write_template};
use forms_renderer::{
    bundled_dir, BackendKind, EngineSettings, FormRenderer, FormsSettings, StandaloneBackend,
    StandaloneTemplateRenderer, TemplateError, TemplateRenderer, ROOT, STANDALONE_BACKEND_ENV,
    STANDALONE_ENGINE_NAME,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

const INPUT: &str = "django/forms/widgets/input.html";

fn django_engine(dir: &Path) -> EngineSettings {
    EngineSettings::new(BackendKind::Django).with_dir(dir)
}

fn fixture_renderer() -> TemplateRenderer {
    let settings = FormsSettings::default()
        .with_installed_app(fixtures_dir().join("apps/forms_tests"))
        .with_engine(django_engine(&fixtures_dir().join("templates")).with_app_dirs(true));
    TemplateRenderer::new(settings)
}

// ==================== Standalone renderer ====================

#[test]
fn test_standalone_get_template_jinja2() {
    init_tracing();
    let renderer = StandaloneTemplateRenderer::with_backend(BackendKind::Jinja2);
    let template = renderer.get_template(INPUT).unwrap();
    assert_eq!(
        template.origin().name,
        Path::new(ROOT).join("jinja2").join(INPUT)
    );
    assert_eq!(template.origin().engine, STANDALONE_ENGINE_NAME);
}

#[test]
fn test_standalone_get_template_django() {
    let renderer = StandaloneTemplateRenderer::with_backend(BackendKind::Django);
    let template = renderer.get_template(INPUT).unwrap();
    assert_eq!(
        template.origin().name,
        Path::new(ROOT).join("templates").join(INPUT)
    );
}

#[test]
fn test_standalone_default_uses_bundled_root() {
    let renderer = StandaloneTemplateRenderer::new();
    let template = renderer.get_template(INPUT).unwrap();
    assert!(template.origin().name.starts_with(ROOT));
}

#[test]
fn test_standalone_backend_from_env() {
    std::env::set_var(STANDALONE_BACKEND_ENV, "django");
    let renderer = StandaloneTemplateRenderer::with_preference(StandaloneBackend::Auto);
    let engine = renderer.standalone_engine();
    std::env::remove_var(STANDALONE_BACKEND_ENV);

    let engine = engine.unwrap();
    assert_eq!(engine.backend(), BackendKind::Django);
    let template = renderer.get_template(INPUT).unwrap();
    assert_eq!(
        template.origin().name,
        bundled_dir(BackendKind::Django).join(INPUT)
    );
}

#[test]
fn test_standalone_render() {
    for backend in [BackendKind::Jinja2, BackendKind::Django] {
        let renderer = StandaloneTemplateRenderer::with_backend(backend);
        let html = renderer
            .render(INPUT, json!({"widget": {"attrs": {}, "type": "foo"}}), None)
            .unwrap();
        assert!(html.contains(r#"type="foo""#), "{}: {}", backend, html);
    }
}

#[test]
fn test_standalone_missing_template() {
    let renderer = StandaloneTemplateRenderer::with_backend(BackendKind::Jinja2);
    let err = renderer.get_template("does/not/exist.html").unwrap_err();
    let missing = err.as_does_not_exist().unwrap();
    assert_eq!(missing.engine.as_deref(), Some(STANDALONE_ENGINE_NAME));
    assert_eq!(
        missing.tried,
        vec![bundled_dir(BackendKind::Jinja2).join("does/not/exist.html")]
    );
}

// ==================== Fallback renderer ====================

#[test]
fn test_custom_template_found() {
    init_tracing();
    let renderer = fixture_renderer();
    let template = renderer
        .get_template("forms_tests/custom_widget.html")
        .unwrap();
    assert_eq!(
        template.origin().name,
        fixtures_dir().join("templates/forms_tests/custom_widget.html")
    );
    assert_eq!(template.origin().engine, "django");
}

#[test]
fn test_custom_template_found_in_installed_app() {
    let renderer = fixture_renderer();
    let template = renderer.get_template("forms_tests/app_widget.html").unwrap();
    assert_eq!(
        template.origin().name,
        fixtures_dir().join("apps/forms_tests/templates/forms_tests/app_widget.html")
    );

    let html = renderer
        .render(
            "forms_tests/app_widget.html",
            json!({"widget": {"name": "title"}}),
            None,
        )
        .unwrap();
    assert_eq!(html, r#"<span class="app-widget">title</span>"#);
}

#[test]
fn test_fallback_to_builtin_template() {
    let renderer = fixture_renderer();
    let template = renderer.get_template(INPUT).unwrap();
    assert!(template.origin().name.starts_with(ROOT));
    assert_eq!(template.origin().engine, STANDALONE_ENGINE_NAME);
}

#[test]
fn test_primary_template_wins_over_bundled() {
    let dir = TempDir::new().unwrap();
    write_template(
        dir.path(),
        INPUT,
        r#"<input class="site" type="{{ widget.type }}">"#,
    );

    let renderer =
        TemplateRenderer::new(FormsSettings::default().with_engine(django_engine(dir.path())));
    let template = renderer.get_template(INPUT).unwrap();
    assert_eq!(template.origin().name, dir.path().join(INPUT));

    let html = renderer
        .render(INPUT, json!({"widget": {"attrs": {}, "type": "foo"}}), None)
        .unwrap();
    assert_eq!(html, r#"<input class="site" type="foo">"#);
}

#[test]
fn test_template_not_found() {
    let renderer = fixture_renderer();
    let err = renderer.get_template("does/not/exist.html").unwrap_err();

    // Records that both the configured engine and the standalone engine were tried
    let missing = err.as_does_not_exist().unwrap();
    assert_eq!(missing.name, "does/not/exist.html");
    assert_eq!(missing.chain.len(), 2);
    assert_eq!(missing.chain[0].engine.as_deref(), Some("django"));
    assert_eq!(
        missing.chain[1].engine.as_deref(),
        Some(STANDALONE_ENGINE_NAME)
    );
    assert!(err.to_string().contains("does/not/exist.html"));
}

#[test]
fn test_template_not_found_without_configured_engines() {
    let renderer = TemplateRenderer::new(FormsSettings::default());
    let err = renderer.get_template("does/not/exist.html").unwrap_err();
    let missing = err.as_does_not_exist().unwrap();
    assert_eq!(missing.chain.len(), 1);
}

#[test]
fn test_path_traversal_is_not_found() {
    // ROOT/jinja2/../Cargo.toml exists, but must not be reachable
    let renderer = fixture_renderer();
    let err = renderer.get_template("../Cargo.toml").unwrap_err();
    let missing = err.as_does_not_exist().unwrap();
    assert_eq!(missing.chain.len(), 2);
    assert!(missing.chain.iter().all(|failure| failure.tried.is_empty()));
}

#[test]
fn test_syntax_error_in_primary_does_not_fall_back() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), INPUT, "<input {% if %}>");

    let settings = FormsSettings::default()
        .with_engine(EngineSettings::new(BackendKind::Jinja2).with_dir(dir.path()));
    let renderer = TemplateRenderer::new(settings);

    let err = renderer.get_template(INPUT).unwrap_err();
    assert!(matches!(err, TemplateError::SyntaxError { .. }));
}

#[test]
fn test_broken_sibling_does_not_block_fallback() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "site/broken.html", "{% if %}");
    write_template(dir.path(), "static/app.js", "var t = '{{';");
    write_template(dir.path(), "site/ok.html", "<p>{{ widget.name }}</p>");

    let renderer =
        TemplateRenderer::new(FormsSettings::default().with_engine(django_engine(dir.path())));

    let template = renderer.get_template(INPUT).unwrap();
    assert_eq!(template.origin().engine, STANDALONE_ENGINE_NAME);
    assert!(template.origin().name.starts_with(ROOT));

    let html = renderer
        .render("site/ok.html", json!({"widget": {"name": "ok"}}), None)
        .unwrap();
    assert_eq!(html, "<p>ok</p>");

    // The broken file itself still reports its own syntax error
    let err = renderer.get_template("site/broken.html").unwrap_err();
    assert!(
        matches!(&err, TemplateError::SyntaxError { name, .. } if name == "site/broken.html"),
        "{:?}",
        err
    );
}

#[test]
fn test_standalone_backend_from_settings() {
    let settings = FormsSettings::default().with_standalone_backend(StandaloneBackend::Django);
    let renderer = TemplateRenderer::new(settings);
    let template = renderer.get_template(INPUT).unwrap();
    assert!(template
        .origin()
        .name
        .starts_with(bundled_dir(BackendKind::Django)));
}

#[test]
fn test_from_config() {
    let dir = TempDir::new().unwrap();
    write_template(
        dir.path(),
        "site/forms_tests/custom_widget.html",
        "<p>{{ widget.name }}</p>",
    );
    write_template(
        dir.path(),
        "forms.yaml",
        r#"
standalone_backend: jinja2
templates:
  - backend: jinja2
    name: site
    dirs: [site]
"#,
    );

    let renderer = TemplateRenderer::from_config(dir.path(), "forms.yaml").unwrap();
    let template = renderer
        .get_template("forms_tests/custom_widget.html")
        .unwrap();
    assert_eq!(template.origin().engine, "site");
    assert_eq!(
        template.origin().name,
        dir.path().join("site/forms_tests/custom_widget.html")
    );

    let fallback = renderer.get_template(INPUT).unwrap();
    assert!(fallback
        .origin()
        .name
        .starts_with(bundled_dir(BackendKind::Jinja2)));
}

#[test]
fn test_from_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = TemplateRenderer::from_config(dir.path(), "forms.yaml");
    assert!(matches!(result, Err(TemplateError::Config(_))));
}

#[test]
fn test_template_outlives_renderer() {
    let template = {
        let renderer = StandaloneTemplateRenderer::with_backend(BackendKind::Django);
        renderer.get_template(INPUT).unwrap()
    };
    let html = template
        .render(json!({"widget": {"attrs": {}, "type": "email"}}), None)
        .unwrap();
    assert!(html.contains(r#"type="email""#));
}
