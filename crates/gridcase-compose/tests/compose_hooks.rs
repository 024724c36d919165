//! Composition with hooks and treatment chunking

use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde_json::{json, Value};

use gridcase_compose::{run_pool, ComposeOutcome, Composer, TemplateEngine};
use gridcase_core::{Config, ContextState, FieldMap, ModelConfig, RunMode, Scenario, SiteRecord};
use gridcase_dsl::{Caches, FunctionRegistry};
use gridcase_hooks::{HookData, HookPoint, HookRegistry};

struct Fixture {
    scenario: Scenario,
    config: Config,
    registry: FunctionRegistry,
    caches: Caches,
    templates: TemplateEngine,
    _dir: tempfile::TempDir,
}

impl Fixture {
    fn new(extra_fields: &[(&str, Value)], model: ModelConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("CASE.CSX");
        fs::write(
            &template_path,
            "*GRID {{label}}\n{{#each treatments}}T {{this.tname}}\n{{/each}}",
        )
        .unwrap();

        let mut templates = TemplateEngine::new();
        templates.register_file("CASE.CSX", &template_path).unwrap();

        let mut fields: FieldMap = [
            ("template".to_string(), json!("CASE.CSX")),
            ("sites".to_string(), json!([])),
            ("label".to_string(), json!("plain")),
        ]
        .into_iter()
        .collect();
        for (k, v) in extra_fields {
            fields.insert(k.to_string(), v.clone());
        }

        Self {
            scenario: Scenario::new("hooks", dir.path().join("work"), fields),
            config: Config {
                model,
                ..Config::default()
            },
            registry: FunctionRegistry::new(),
            caches: Caches::new(),
            templates,
            _dir: dir,
        }
    }

    fn composer<'a>(&'a self, hooks: &'a HookRegistry) -> Composer<'a> {
        Composer {
            scenario: &self.scenario,
            config: &self.config,
            registry: &self.registry,
            hooks,
            caches: &self.caches,
            templates: &self.templates,
        }
    }
}

#[test]
fn post_context_hook_enriches_the_rendered_case() {
    let fixture = Fixture::new(&[], ModelConfig::default());
    let mut hooks = HookRegistry::new();
    hooks.register(
        HookPoint::PostBuildContext,
        Arc::new(|_config, data| {
            let HookData::Context(ContextState::Resolved(mut fields)) = data else {
                return data;
            };
            fields.insert("label".to_string(), json!("enriched"));
            HookData::Context(ContextState::Resolved(fields))
        }),
        FieldMap::new(),
    );

    let composer = fixture.composer(&hooks);
    let outcome = composer.compose_site(&SiteRecord::new(1.0, 2.0)).unwrap();

    let ComposeOutcome::Composed(cases) = outcome else {
        panic!("expected a composed case");
    };
    let body = fs::read_to_string(cases[0].path()).unwrap();
    assert!(body.contains("*GRID enriched"));
}

#[test]
fn veto_produces_skip_and_no_case_file() {
    let fixture = Fixture::new(&[], ModelConfig::default());
    let mut hooks = HookRegistry::new();
    hooks.register(
        HookPoint::PostBuildContext,
        Arc::new(|_config, _data| HookData::Context(ContextState::Skipped)),
        FieldMap::new(),
    );
    let skip_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let skip_clone = Arc::clone(&skip_count);
    hooks.register(
        HookPoint::PostComposeSkip,
        Arc::new(move |_config, data| {
            skip_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            data
        }),
        FieldMap::new(),
    );

    let composer = fixture.composer(&hooks);
    let cancel = AtomicBool::new(false);
    let summary = run_pool(&composer, vec![SiteRecord::new(1.0, 2.0)], 1, &cancel);

    assert_eq!(summary.composed, 0);
    assert_eq!(summary.skipped, 1);
    assert!(summary.cases.is_empty());
    assert_eq!(skip_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    // the site directory may exist, but no case file was written
    let case = fixture.scenario.work_dir().join("1_000N/2_000E/CASE.CSX");
    assert!(!case.exists());
}

#[test]
fn single_mode_chunks_into_numbered_directories() {
    let treatments = json!([
        {"tname": "t1"}, {"tname": "t2"}, {"tname": "t3"}
    ]);
    let fixture = Fixture::new(
        &[("treatments", treatments)],
        ModelConfig {
            mode: RunMode::Single,
            batch_chunks: 2,
            ..ModelConfig::default()
        },
    );
    let hooks = HookRegistry::new();

    let composer = fixture.composer(&hooks);
    let outcome = composer.compose_site(&SiteRecord::new(1.0, 2.0)).unwrap();

    let ComposeOutcome::Composed(cases) = outcome else {
        panic!("expected composed cases");
    };
    assert_eq!(cases.len(), 2);

    let site_dir = fixture.scenario.work_dir().join("1_000N/2_000E");
    let first = fs::read_to_string(site_dir.join("0/CASE.CSX")).unwrap();
    let second = fs::read_to_string(site_dir.join("1/CASE.CSX")).unwrap();
    assert!(first.contains("T t1") && first.contains("T t2"));
    assert!(!first.contains("T t3"));
    assert!(second.contains("T t3"));
}

#[test]
fn batch_mode_writes_chunk_files_and_manifest() {
    let treatments = json!([
        {"tname": "t1"}, {"tname": "t2"}, {"tname": "t3"}
    ]);
    let fixture = Fixture::new(
        &[("treatments", treatments)],
        ModelConfig {
            mode: RunMode::Batch,
            batch_chunks: 2,
            ..ModelConfig::default()
        },
    );
    let hooks = HookRegistry::new();

    let composer = fixture.composer(&hooks);
    let outcome = composer.compose_site(&SiteRecord::new(1.0, 2.0)).unwrap();

    let ComposeOutcome::Composed(cases) = outcome else {
        panic!("expected composed cases");
    };
    assert_eq!(cases.len(), 2);

    let site_dir = fixture.scenario.work_dir().join("1_000N/2_000E");
    assert!(site_dir.join("CASE00.CSX").is_file());
    assert!(site_dir.join("CASE01.CSX").is_file());

    let manifest = fs::read_to_string(site_dir.join("BATCHLIST.RUN")).unwrap();
    let lines: Vec<&str> = manifest.lines().collect();
    assert!(lines[0].starts_with("$BATCH"));
    assert!(lines[1].starts_with("@FILEX"));
    // 2 treatments in chunk 0, 1 in chunk 1
    assert_eq!(lines.len(), 2 + 3);
    assert!(lines[2].starts_with("CASE00.CSX"));
    assert!(lines[4].starts_with("CASE01.CSX"));
    assert!(lines[2].contains("    1      1      0      0      0"));
    assert!(lines[3].contains("    2      1      0      0      0"));
}

#[test]
fn recomposition_is_idempotent_with_linked_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let soil_src = dir.path().join("XX.SOL");
    fs::write(&soil_src, "*XX000001\n").unwrap();

    let fixture = Fixture::new(
        &[(
            "soilFiles",
            json!([soil_src.to_string_lossy()]),
        )],
        ModelConfig::default(),
    );
    let hooks = HookRegistry::new();
    let composer = fixture.composer(&hooks);

    let site = SiteRecord::new(1.0, 2.0);
    composer.compose_site(&site).unwrap();
    // second composition of the same site: existing links are skipped
    composer.compose_site(&site).unwrap();

    let linked = fixture
        .scenario
        .work_dir()
        .join("1_000N/2_000E")
        .join("XX.SOL");
    assert!(linked.exists());
    assert_eq!(fs::read_to_string(&linked).unwrap(), "*XX000001\n");

    let entries: Vec<_> = fs::read_dir(fixture.scenario.work_dir().join("1_000N/2_000E"))
        .unwrap()
        .collect();
    // exactly one link and one case file, no duplicates from the re-run
    assert_eq!(entries.len(), 2);
}
