//! Run configuration
//!
//! Configurations are JSON: global settings (directories, worker counts,
//! the model binary), a `default_setup` field map shared by all runs,
//! and a `runs` list of per-run overlays. Loading merges each run over
//! the defaults and assigns it a work directory; validation confirms the
//! referenced raster layers exist and agree on resolution and alignment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use gridcase_gis::{AsciiGrid, GridProfile};

use crate::error::ConfigError;
use crate::scenario::{extract_raster, Scenario};
use crate::{value_str, FieldMap};

/// Execution mode of the external binary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// One case file per treatment set, invoked individually
    #[default]
    #[serde(rename = "A")]
    Single,
    /// Chunked case files governed by a batch manifest
    #[serde(rename = "B")]
    Batch,
}

impl RunMode {
    /// The mode flag passed to the external binary
    #[inline]
    #[must_use]
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Single => "A",
            Self::Batch => "B",
        }
    }
}

/// External model binary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the executable
    #[serde(default)]
    pub executable: PathBuf,

    /// Execution mode
    #[serde(default)]
    pub mode: RunMode,

    /// Treatments per case file in batch mode
    #[serde(default = "default_batch_chunks", rename = "batchChunks")]
    pub batch_chunks: usize,

    /// Batch manifest filename
    #[serde(default = "default_batch_file", rename = "batchFile")]
    pub batch_file: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            mode: RunMode::default(),
            batch_chunks: default_batch_chunks(),
            batch_file: default_batch_file(),
        }
    }
}

fn default_batch_chunks() -> usize {
    99
}

fn default_batch_file() -> String {
    "BATCHLIST.RUN".to_string()
}

/// One entry of the configuration's plugin list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    /// Plugin name, resolved against the compiled-in catalog
    pub plugin: String,

    /// Plugin-local configuration
    #[serde(default)]
    pub params: FieldMap,
}

/// Whole-run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the generated case tree
    #[serde(default = "default_work_dir", rename = "workDir")]
    pub work_dir: PathBuf,

    /// Directory holding case templates
    #[serde(default, rename = "templateDir")]
    pub template_dir: Option<PathBuf>,

    /// Directory holding weather files, if weather is linked
    #[serde(default, rename = "weatherDir")]
    pub weather_dir: Option<PathBuf>,

    /// Root of the soil database (profile map + `.SOL` files)
    #[serde(default, rename = "soilDb")]
    pub soil_db: Option<PathBuf>,

    /// Worker count for the context-build/composition pool
    #[serde(default, rename = "setupWorkers")]
    pub setup_workers: Option<usize>,

    /// Worker count for the external-binary pool
    #[serde(default, rename = "runWorkers")]
    pub run_workers: Option<usize>,

    /// External model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Plugins to load, in order
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    /// Fields shared by every run
    #[serde(default)]
    pub default_setup: FieldMap,

    /// Per-run overlays
    #[serde(default)]
    pub runs: Vec<FieldMap>,

    /// Export the discovered run list instead of executing (CLI-set)
    #[serde(skip)]
    pub export_runlist: bool,

    /// Suppress console progress markers (CLI-set)
    #[serde(skip)]
    pub quiet: bool,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            template_dir: None,
            weather_dir: None,
            soil_db: None,
            setup_workers: None,
            run_workers: None,
            model: ModelConfig::default(),
            plugins: Vec::new(),
            default_setup: FieldMap::new(),
            runs: Vec::new(),
            export_runlist: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Load a configuration file
    ///
    /// # Errors
    /// Returns `ConfigError` if the file is unreadable or not valid
    /// JSON. Validation is separate; see [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Effective size of the composition pool
    #[must_use]
    pub fn effective_setup_workers(&self) -> usize {
        self.setup_workers.unwrap_or_else(available_workers)
    }

    /// Effective size of the execution pool
    #[must_use]
    pub fn effective_run_workers(&self) -> usize {
        self.run_workers.unwrap_or_else(available_workers)
    }

    /// Merge every run over `default_setup` into scenarios
    ///
    /// Object-valued fields present on both sides merge key-wise; any
    /// other collision is won by the run. Each scenario gets
    /// `<workDir>/<name>` as its work directory (`run_<index>` when the
    /// run has no `name`), recorded in its `workDir` field as well so
    /// expressions and templates can reference it.
    #[must_use]
    pub fn scenarios(&self) -> Vec<Scenario> {
        self.runs
            .iter()
            .enumerate()
            .map(|(index, run)| {
                let mut fields = self.default_setup.clone();
                for (key, value) in run {
                    let both_objects =
                        value.is_object() && fields.get(key).is_some_and(Value::is_object);
                    if both_objects {
                        if let (Some(Value::Object(existing)), Some(overlay)) =
                            (fields.get_mut(key), value.as_object())
                        {
                            for (k, v) in overlay {
                                existing.insert(k.clone(), v.clone());
                            }
                        }
                    } else {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                let name = fields
                    .get("name")
                    .and_then(value_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("run_{index}"));
                let work_dir = self.work_dir.join(&name);
                fields.insert(
                    "workDir".to_string(),
                    Value::String(work_dir.to_string_lossy().into_owned()),
                );
                Scenario::new(name, work_dir, fields)
            })
            .collect()
    }

    /// Validate the configuration before any work starts
    ///
    /// Checks that runs exist, each names a template and a site source,
    /// and that every referenced raster layer opens and agrees with the
    /// others on cell size and grid alignment.
    ///
    /// # Errors
    /// Returns the first `ConfigError` encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs.is_empty() {
            return Err(ConfigError::NoRuns);
        }

        let scenarios = self.scenarios();
        for scenario in &scenarios {
            for required in ["template", "sites"] {
                if scenario.field(required).is_none() {
                    return Err(ConfigError::MissingField {
                        run: scenario.name().to_string(),
                        field: required.to_string(),
                    });
                }
            }
        }

        let mut reference: Option<(String, GridProfile)> = None;
        for scenario in &scenarios {
            for (_, layer) in scenario.raster_layers() {
                debug!(layer = %layer, "checking raster layer");
                let profile = AsciiGrid::profile_of(Path::new(&layer))?;
                match &reference {
                    None => reference = Some((layer, profile)),
                    Some((first, expected)) => {
                        if !expected.compatible_with(&profile) {
                            return Err(ConfigError::LayerMismatch {
                                layer,
                                detail: format!(
                                    "resolution or alignment differs from {first}"
                                ),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every raster path referenced anywhere in the configuration
    #[must_use]
    pub fn raster_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let values = self
            .default_setup
            .values()
            .chain(self.runs.iter().flat_map(|r| r.values()));
        for value in values {
            if let Some(path) = value_str(value).and_then(extract_raster) {
                if !paths.iter().any(|p| p == path) {
                    paths.push(path.to_string());
                }
            }
        }
        paths
    }
}

fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
