//! Per-site case composition
//!
//! For a resolved context the composer lays out
//! `<workDir>/<lat>/<lng>`, links the external inputs in (weather,
//! soils, extra includes), renders the case template, and writes one
//! case file per treatment chunk. Batch mode adds the manifest the
//! external binary consumes instead of individual case files.
//!
//! Hooks bracket every stage: pre/post context build (enrich or veto),
//! post-composition success and skip.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use gridcase_core::{
    CaseFile, Config, ContextState, FieldMap, RunMode, Scenario, SiteRecord,
};
use gridcase_dsl::{build_context_seeded, Caches, FunctionRegistry};
use gridcase_gis::news_path;
use gridcase_hooks::{HookData, HookPoint, HookRegistry};

use crate::error::ComposeError;
use crate::template::TemplateEngine;

/// What composing one site produced
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeOutcome {
    /// Cases written for this site
    Composed(Vec<CaseFile>),
    /// Resolution failed or a hook vetoed; nothing written
    Skipped,
}

/// Per-scenario composer, shared read-only by every pool worker
pub struct Composer<'a> {
    /// The scenario being composed
    pub scenario: &'a Scenario,
    /// Whole-run configuration
    pub config: &'a Config,
    /// Verb registry for context resolution
    pub registry: &'a FunctionRegistry,
    /// Hook registrations
    pub hooks: &'a HookRegistry,
    /// Shared lookup caches
    pub caches: &'a Caches,
    /// Registered case templates
    pub templates: &'a TemplateEngine,
}

impl Composer<'_> {
    /// Compose every case for one site
    ///
    /// # Errors
    /// Returns `ComposeError` for filesystem or template failures; those
    /// are fatal for this site only.
    pub fn compose_site(&self, site: &SiteRecord) -> Result<ComposeOutcome, ComposeError> {
        let seed = self
            .hooks
            .run(
                HookPoint::PreBuildContext,
                HookData::Context(ContextState::Resolved(site.seed_fields())),
            )
            .into_context()
            .unwrap_or(ContextState::Skipped);
        let state = match seed {
            ContextState::Resolved(seed_fields) => build_context_seeded(
                self.scenario,
                seed_fields,
                self.registry,
                self.config,
                self.caches,
            ),
            ContextState::Skipped => ContextState::Skipped,
        };

        let state = self
            .hooks
            .run(HookPoint::PostBuildContext, HookData::Context(state))
            .into_context()
            .unwrap_or(ContextState::Skipped);

        let (y, x) = news_path(site.lat, site.lng);
        let site_dir = self.work_dir_of(&state).join(y).join(x);

        let ContextState::Resolved(context) = state else {
            self.hooks.run(
                HookPoint::PostComposeSkip,
                HookData::Case(CaseFile::new(site_dir, String::new())),
            );
            return Ok(ComposeOutcome::Skipped);
        };

        let cases = self.write_cases(&site_dir, context)?;
        Ok(ComposeOutcome::Composed(cases))
    }

    fn work_dir_of(&self, state: &ContextState) -> PathBuf {
        state
            .fields()
            .and_then(|fields| fields.get("workDir"))
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.scenario.work_dir().to_path_buf())
    }

    fn write_cases(
        &self,
        site_dir: &Path,
        context: FieldMap,
    ) -> Result<Vec<CaseFile>, ComposeError> {
        let template = context
            .get("template")
            .and_then(Value::as_str)
            .ok_or_else(|| ComposeError::MissingField {
                field: "template".to_string(),
            })?
            .to_string();

        make_run_directory(site_dir)?;

        let treatments = context.get("treatments").and_then(Value::as_array).cloned();
        let chunks: Vec<Option<Vec<Value>>> = match &treatments {
            None => vec![None],
            Some(all) => split_levels(all, self.config.model.batch_chunks)
                .into_iter()
                .map(Some)
                .collect(),
        };

        let batch_mode = self.config.model.mode == RunMode::Batch;
        if batch_mode {
            self.link_inputs(site_dir, &context)?;
        }

        let mut cases = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let case_dir = if batch_mode || chunks.len() == 1 {
                site_dir.to_path_buf()
            } else {
                // one numbered directory per chunk in single mode
                site_dir.join(index.to_string())
            };
            if !batch_mode {
                make_run_directory(&case_dir)?;
                self.link_inputs(&case_dir, &context)?;
            }

            let mut chunk_context = context.clone();
            if let Some(treatments) = chunk {
                chunk_context.insert("treatments".to_string(), Value::Array(treatments.clone()));
            }

            let rendered = self.templates.render(&template, &chunk_context)?;
            let file_name = if batch_mode {
                chunk_file_name(&template, index)
            } else {
                template.clone()
            };
            let path = case_dir.join(&file_name);
            fs::write(&path, rendered).map_err(|e| ComposeError::io(&path, e))?;
            debug!(path = %path.display(), "wrote case file");

            let case = CaseFile::new(case_dir, file_name);
            let case = match self
                .hooks
                .run(HookPoint::PostComposeSuccess, HookData::Case(case.clone()))
            {
                HookData::Case(rewritten) => rewritten,
                _ => case,
            };
            cases.push(case);
        }

        if batch_mode {
            self.write_batch_manifest(site_dir, &template, &chunks)?;
        }
        Ok(cases)
    }

    /// Link weather, soil, and include files into a case directory
    ///
    /// Links are check-then-skip so re-runs never fail on an existing
    /// link.
    fn link_inputs(&self, dir: &Path, context: &FieldMap) -> Result<(), ComposeError> {
        if let Some(weather_dir) = &self.config.weather_dir {
            if let Some(wth_file) = context.get("wthFile").and_then(Value::as_str) {
                let station = context
                    .get("wsta")
                    .and_then(Value::as_str)
                    .map_or_else(|| wth_file.to_string(), |wsta| format!("{wsta}.WTH"));
                link_if_absent(&weather_dir.join(wth_file), &dir.join(station))?;
            }
        }

        if let Some(soils) = context.get("soilFiles").and_then(Value::as_array) {
            for soil in soils.iter().filter_map(Value::as_str) {
                let source = Path::new(soil);
                let Some(name) = source.file_name() else {
                    warn!(soil, "soil file without a file name");
                    continue;
                };
                link_if_absent(source, &dir.join(name))?;
            }
        }

        for include in self.scenario.include_files() {
            let source = Path::new(&include);
            let Some(name) = source.file_name() else {
                continue;
            };
            link_if_absent(source, &dir.join(name))?;
        }
        Ok(())
    }

    /// Write the batch-control manifest referencing every chunk
    fn write_batch_manifest(
        &self,
        site_dir: &Path,
        template: &str,
        chunks: &[Option<Vec<Value>>],
    ) -> Result<(), ComposeError> {
        let path = site_dir.join(&self.config.model.batch_file);
        let mut body = String::from("$BATCH(GRIDCASE)\n");
        body.push_str(&format!(
            "@FILEX{:90}TRTNO     RP     SQ     OP     CO\n",
            ""
        ));
        for (index, chunk) in chunks.iter().enumerate() {
            let count = chunk.as_ref().map_or(1, Vec::len);
            let file_name = chunk_file_name(template, index);
            for treatment in 1..=count {
                body.push_str(&format!(
                    "{file_name:<94}{treatment:>5}      1      0      0      0\n"
                ));
            }
        }
        fs::write(&path, body).map_err(|e| ComposeError::io(&path, e))
    }
}

/// Create a run directory, tolerating that it already exists
fn make_run_directory(dir: &Path) -> Result<(), ComposeError> {
    fs::create_dir_all(dir).map_err(|e| ComposeError::io(dir, e))
}

/// Chunk a treatment list into fixed-size groups
fn split_levels(levels: &[Value], max_size: usize) -> Vec<Vec<Value>> {
    if levels.is_empty() {
        return vec![Vec::new()];
    }
    levels
        .chunks(max_size.max(1))
        .map(<[Value]>::to_vec)
        .collect()
}

/// Chunk case file name: `MAIZE.CSX` → `MAIZE00.CSX`, `MAIZE01.CSX`, ...
fn chunk_file_name(template: &str, index: usize) -> String {
    let path = Path::new(template);
    let stem = path
        .file_stem()
        .map_or_else(|| template.to_string(), |s| s.to_string_lossy().into_owned());
    match path.extension() {
        Some(ext) => format!("{stem}{index:02}.{}", ext.to_string_lossy()),
        None => format!("{stem}{index:02}"),
    }
}

/// Symlink `source` at `target` unless something is already there
fn link_if_absent(source: &Path, target: &Path) -> Result<(), ComposeError> {
    if target.exists() || target.symlink_metadata().is_ok() {
        return Ok(());
    }
    let absolute = source
        .canonicalize()
        .unwrap_or_else(|_| source.to_path_buf());
    symlink_file(&absolute, target).map_err(|e| ComposeError::io(target, e))
}

#[cfg(unix)]
fn symlink_file(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn symlink_file(source: &Path, target: &Path) -> std::io::Result<()> {
    // No symlinks to lean on; a copy keeps the case self-contained
    std::fs::copy(source, target).map(|_| ())
}
