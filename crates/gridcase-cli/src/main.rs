//! gridcase command line
//!
//! Drives the pipeline in stages, mirroring how operators actually run
//! it: `--setup` samples sites and composes the case tree, `--run-model`
//! fans the external binary over it, `--all` does both. Console output
//! stays terse; details go to a timestamped log file.

mod plugins;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use clap::{Arg, ArgAction, Command};
use tracing::info;

use gridcase_compose::{run_pool, sample_sites, Composer, TemplateEngine};
use gridcase_core::{Config, ConfigError, Scenario};
use gridcase_dsl::{Caches, FunctionRegistry};
use gridcase_exec::{discover_cases, execute, export_runlist};
use gridcase_hooks::{load_plugins, HookData, HookPoint, HookRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("gridcase")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Gridded crop-simulation driver")
        .arg(Arg::new("config").help("JSON configuration file to run"))
        .arg(
            Arg::new("all")
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Run all the stages"),
        )
        .arg(
            Arg::new("setup")
                .long("setup")
                .action(ArgAction::SetTrue)
                .help("Set up the case directory structure and files"),
        )
        .arg(
            Arg::new("run-model")
                .long("run-model")
                .action(ArgAction::SetTrue)
                .help("Run the model over the case structure"),
        )
        .arg(
            Arg::new("export-runlist")
                .long("export-runlist")
                .action(ArgAction::SetTrue)
                .help("Export the list of discovered cases instead of running them"),
        )
        .arg(
            Arg::new("clean-work-dir")
                .long("clean-work-dir")
                .action(ArgAction::SetTrue)
                .help("Clean the work directory prior to setup"),
        )
        .arg(
            Arg::new("logfile-prefix")
                .long("logfile-prefix")
                .default_value("gridcase")
                .help("Prefix for the <prefix>-YYYYmmdd-HHMMSS.log file"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress console progress markers"),
        );

    let mut help = cli.clone();
    let matches = cli.get_matches();
    let Some(config_path) = matches.get_one::<String>("config") else {
        help.print_help().ok();
        return Ok(());
    };

    let prefix = matches
        .get_one::<String>("logfile-prefix")
        .map(String::as_str)
        .unwrap_or("gridcase");
    init_logging(prefix)?;
    info!("gridcase started");

    let config = Config::load(Path::new(config_path))?;
    config.validate()?;

    if matches.get_flag("clean-work-dir") && config.work_dir.exists() {
        println!("Cleaning the work directory");
        std::fs::remove_dir_all(&config.work_dir)
            .with_context(|| format!("cleaning {}", config.work_dir.display()))?;
    }

    let hooks = load_plugins(&config, &plugins::catalog());
    let mut config = apply_post_config_hook(config, &hooks);
    // CLI flags are not part of the file and override whatever hooks did
    config.export_runlist = matches.get_flag("export-runlist");
    config.quiet = matches.get_flag("quiet");
    let config = config;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let run_all = matches.get_flag("all");
    if run_all || matches.get_flag("setup") {
        println!("Setting up points and directory structure");
        setup(&config, &hooks, &cancel)?;
    }

    if run_all || matches.get_flag("run-model") {
        let cases = discover_cases(
            &config.work_dir,
            config.model.mode,
            &config.model.batch_file,
        );
        if config.export_runlist {
            let path = config.work_dir.join("runlist.txt");
            export_runlist(&cases, &path)?;
            println!("Exported {} cases to {}", cases.len(), path.display());
        } else {
            if config.model.executable.as_os_str().is_empty() {
                return Err(ConfigError::MissingExecutable.into());
            }
            println!("Running the model over the directory structure");
            let report = execute(&config, &hooks, cases, &cancel).await;
            println!("{}", report.summary_line());
        }
    }

    info!("gridcase completed");
    Ok(())
}

/// Compose every scenario's case tree
fn setup(config: &Config, hooks: &HookRegistry, cancel: &AtomicBool) -> anyhow::Result<()> {
    let registry = FunctionRegistry::with_builtins();
    let caches = Caches::new();
    caches
        .ensure_ready(config)
        .map_err(|e| anyhow!("building lookup caches: {e}"))?;

    for scenario in config.scenarios() {
        let unknown = registry.unknown_verbs(&scenario);
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownVerbs {
                run: scenario.name().to_string(),
                verbs: unknown,
            }
            .into());
        }

        let templates = load_templates(config, &scenario)?;
        let composer = Composer {
            scenario: &scenario,
            config,
            registry: &registry,
            hooks,
            caches: &caches,
            templates: &templates,
        };

        let records = sample_sites(&scenario, &caches)?;
        let summary = run_pool(
            &composer,
            records,
            config.effective_setup_workers(),
            cancel,
        );
        info!(
            run = scenario.name(),
            composed = summary.composed,
            skipped = summary.skipped,
            failed = summary.failed,
            "composition finished"
        );
        println!(
            "{}: {} sites composed, {} skipped, {} failed",
            scenario.name(),
            summary.composed,
            summary.skipped,
            summary.failed
        );
    }
    Ok(())
}

fn load_templates(config: &Config, scenario: &Scenario) -> anyhow::Result<TemplateEngine> {
    let name = scenario
        .template()
        .ok_or_else(|| anyhow!("run {:?} has no template", scenario.name()))?;
    let dir = config
        .template_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let mut templates = TemplateEngine::new();
    templates
        .register_file(name, &dir.join(name))
        .map_err(|e| anyhow!("loading template {name:?}: {e}"))?;
    Ok(templates)
}

/// Fold the post-config hook chain over the loaded configuration
///
/// Plugins see the configuration as a field map; whatever they merge in
/// is deserialized back. A contribution that no longer parses as a
/// configuration is dropped with a warning.
fn apply_post_config_hook(config: Config, hooks: &HookRegistry) -> Config {
    if hooks.count(HookPoint::PostConfig) == 0 {
        return config;
    }
    let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&config) else {
        return config;
    };
    let seed = fields.into_iter().collect();
    let folded = hooks.run(HookPoint::PostConfig, HookData::Config(seed));
    let Some(fields) = folded.into_config() else {
        return config;
    };
    let object: serde_json::Map<String, serde_json::Value> = fields.into_iter().collect();
    match serde_json::from_value(serde_json::Value::Object(object)) {
        Ok(rewritten) => rewritten,
        Err(err) => {
            tracing::warn!(error = %err, "post_config hook output is not a configuration; ignoring");
            config
        }
    }
}

fn init_logging(prefix: &str) -> anyhow::Result<()> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = format!("{prefix}-{stamp}.log");
    let file = std::fs::File::create(&path).with_context(|| format!("creating {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
