//! Reconciliation
//!
//! Matching, importing and cascade updates against the catalog. Each stage
//! fans per-object tasks out over a bounded worker pool and joins before
//! returning, so identifiers written by one stage are visible to the next.
//!
//! Per-object failures are logged, recorded on the object and in the run
//! summary, and never cancel sibling tasks. Fatal errors are returned once
//! the whole stage has finished.

pub mod cascade;
mod importer;
mod matcher;
pub mod remap;
mod resolve;

pub use cascade::CascadeAction;
pub use importer::{ImportOutcome, VersionAction};
pub use remap::{RemapTable, RemapTables};

use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::HashSet;
use tracing::{error, info, info_span, warn};

use crate::catalog::CatalogService;
use crate::error::{ImportError, Result};
use crate::model::{CatalogObject, LocalIds, ObjectKind, ObjectMap, VersionContent};
use crate::report::ImportSummary;
use crate::version::{CascadeVersioning, VersionStrategy};

/// Identity of one import run, carried into every log span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    run_id: String,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }

    /// A run id derived from the current time
    pub fn generate() -> Self {
        Self::new(format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ")))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Knobs for matching, importing and cascading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub strategy: VersionStrategy,
    pub cascade_versioning: CascadeVersioning,
    /// Worker pool size
    pub workers: usize,
    pub object_page_size: usize,
    pub version_page_size: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            strategy: VersionStrategy::Major,
            cascade_versioning: CascadeVersioning::Inherit,
            workers: 8,
            object_page_size: 10,
            version_page_size: 20,
        }
    }
}

/// Runs reconciliation stages for one domain
pub struct ImportOperator<'a> {
    catalog: &'a dyn CatalogService,
    domain_id: String,
    options: ReconcileOptions,
    context: RunContext,
    pool: ThreadPool,
    remaps: RemapTables,
}

impl<'a> ImportOperator<'a> {
    pub fn new(
        catalog: &'a dyn CatalogService,
        domain_id: impl Into<String>,
        options: ReconcileOptions,
        context: RunContext,
    ) -> Result<Self> {
        let prefix = context.run_id().to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(move |i| format!("{}-worker-{}", prefix, i))
            .build()
            .map_err(|e| ImportError::WorkerPool(e.to_string()))?;

        Ok(Self {
            catalog,
            domain_id: domain_id.into(),
            options,
            context,
            pool,
            remaps: RemapTables::new(),
        })
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    pub fn remaps(&self) -> &RemapTables {
        &self.remaps
    }

    /// Match every object of one kind against the catalog
    pub fn match_stage<C: VersionContent>(
        &self,
        objects: &mut ObjectMap<C>,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let results = self.run_stage("match", objects, |object| {
            matcher::match_object(self.catalog, &self.options, &self.domain_id, object)
        });
        self.settle_objects("match", objects, results, summary, |_, ()| {})
    }

    /// Create or update whatever matching did not find
    pub fn import_stage<C: VersionContent>(
        &self,
        objects: &mut ObjectMap<C>,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let results = self.run_stage("import", objects, |object| {
            importer::import_object(self.catalog, &self.options, &self.remaps, &self.domain_id, object)
        });
        self.settle_objects("import", objects, results, summary, |summary, outcome| {
            summary.record_import(C::KIND, &outcome)
        })
    }

    /// Match, then import
    pub fn reconcile<C: VersionContent>(
        &self,
        objects: &mut ObjectMap<C>,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        info!(run = %self.context.run_id(), kind = %C::KIND, count = objects.len(), "Reconciling");
        self.match_stage(objects, summary)?;
        self.import_stage(objects, summary)
    }

    /// Rewrite local references to catalog ids.
    ///
    /// Objects referring to a version that was not imported are dropped
    /// with `UnresolvedDependency`.
    pub fn resolve_stage<C: VersionContent>(
        &self,
        objects: &mut ObjectMap<C>,
        ids: &LocalIds,
        summary: &mut ImportSummary,
    ) {
        for object in objects.values_mut().filter(|o| !o.is_failed()) {
            if let Err(err) = resolve::resolve_object(object, ids) {
                warn!(
                    run = %self.context.run_id(),
                    kind = %C::KIND,
                    name = %object.name,
                    error = %err,
                    "Skipping object"
                );
                summary.record_skip(C::KIND, &object.name, "resolve", err.to_string());
                object.fail(err.to_string());
            }
        }
    }

    /// Re-version existing objects of one kind whose latest version
    /// depends on a superseded version. `own_versions` are this run's
    /// version ids of the kind, which are never cascaded.
    pub fn cascade<C: VersionContent>(
        &self,
        own_versions: &HashSet<String>,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        cascade::cascade_kind::<C>(self, own_versions, summary)
    }

    fn run_stage<C, T, F>(
        &self,
        stage: &'static str,
        objects: &mut ObjectMap<C>,
        task: F,
    ) -> Vec<(String, Result<T>)>
    where
        C: VersionContent,
        T: Send,
        F: Fn(&mut CatalogObject<C>) -> Result<T> + Sync,
    {
        let run_id = self.context.run_id();
        self.pool.install(|| {
            objects
                .par_iter_mut()
                .filter(|(_, object)| !object.is_failed())
                .map(|(name, object)| {
                    let span = info_span!("object", run = %run_id, stage, kind = %C::KIND, name = %name);
                    let _enter = span.enter();
                    (name.clone(), task(object))
                })
                .collect()
        })
    }

    fn settle_objects<C, T>(
        &self,
        stage: &str,
        objects: &mut ObjectMap<C>,
        results: Vec<(String, Result<T>)>,
        summary: &mut ImportSummary,
        on_ok: impl FnMut(&mut ImportSummary, T),
    ) -> Result<()>
    where
        C: VersionContent,
    {
        self.settle(C::KIND, stage, results, summary, on_ok, |name, reason| {
            if let Some(object) = objects.get_mut(name) {
                object.fail(reason);
            }
        })
    }

    /// Fold task results after a stage barrier. Per-object errors are
    /// recorded; the first fatal error is returned.
    fn settle<T>(
        &self,
        kind: ObjectKind,
        stage: &str,
        results: Vec<(String, Result<T>)>,
        summary: &mut ImportSummary,
        mut on_ok: impl FnMut(&mut ImportSummary, T),
        mut on_skip: impl FnMut(&str, String),
    ) -> Result<()> {
        let mut fatal = None;
        for (name, result) in results {
            match result {
                Ok(value) => on_ok(summary, value),
                Err(err) if err.is_fatal() => {
                    error!(run = %self.context.run_id(), %kind, name = %name, stage, error = %err, "Fatal error");
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
                Err(err) => {
                    warn!(run = %self.context.run_id(), %kind, name = %name, stage, error = %err, "Skipping object");
                    let reason = err.to_string();
                    summary.record_skip(kind, &name, stage, reason.clone());
                    on_skip(&name, reason);
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
