//! End-to-end import run
//!
//! Parses and maps the document, checks the import set, then reconciles each
//! kind in dependency order: enums and schemas, events, then the optional
//! application and event API. Cascade updates run last when enabled.

use std::path::Path;
use tracing::{info, info_span};

use crate::asyncapi::SpecDocument;
use crate::catalog::{CatalogService, DomainLookup};
use crate::config::ImporterConfig;
use crate::error::Result;
use crate::mapper::{DomainMapper, MapperOptions};
use crate::model::{
    ApplicationContent, CanonicalModel, EventApiContent, EventContent, ObjectKind,
};
use crate::reconcile::{ImportOperator, ReconcileOptions, RunContext};
use crate::report::ImportSummary;

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Name of the target application domain
    pub domain: String,
    pub mapper: MapperOptions,
    pub reconcile: ReconcileOptions,
    pub cascade_update: bool,
}

impl ImportOptions {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            mapper: MapperOptions::default(),
            reconcile: ReconcileOptions::default(),
            cascade_update: false,
        }
    }

    /// Build from configuration; `domain` overrides `import.domain`
    pub fn from_config(config: &ImporterConfig, domain: Option<&str>) -> Result<Self> {
        let domain = domain
            .map(str::to_string)
            .or_else(|| config.import.domain.clone())
            .ok_or_else(|| config_crate::ConfigError::NotFound("import.domain".into()))?;

        Ok(Self {
            domain,
            mapper: MapperOptions {
                include_publish_operations: config.mapper.include_publish_operations,
                application: config.import.import_application,
                event_api: config.import.import_event_api,
            },
            reconcile: ReconcileOptions {
                strategy: config.import.version_strategy,
                cascade_versioning: config.import.cascade_versioning,
                workers: config.import.workers,
                object_page_size: config.catalog.object_page_size,
                version_page_size: config.catalog.version_page_size,
            },
            cascade_update: config.import.cascade_update,
        })
    }
}

/// Runs imports against one catalog
pub struct ImportPipeline<'a> {
    catalog: &'a dyn CatalogService,
    options: ImportOptions,
    context: RunContext,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(catalog: &'a dyn CatalogService, options: ImportOptions) -> Self {
        Self { catalog, options, context: RunContext::generate() }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<ImportSummary> {
        self.run(&SpecDocument::load(path)?)
    }

    pub fn run_text(&self, text: &str) -> Result<ImportSummary> {
        self.run(&SpecDocument::parse(text)?)
    }

    /// Import a parsed document
    pub fn run(&self, doc: &SpecDocument) -> Result<ImportSummary> {
        let run_id = self.context.run_id();
        let span = info_span!("import", run = %run_id, domain = %self.options.domain);
        let _enter = span.enter();

        let mut model = DomainMapper::new(doc, self.options.mapper).map()?;
        model.validate()?;

        let domain = self.catalog.get_domain(DomainLookup::Name(&self.options.domain))?;
        info!(domain_id = %domain.id, "Resolved application domain");
        model.assign_domain(&domain.id);

        let mut summary = ImportSummary::new(run_id);
        summary.domain = Some(domain.name.clone());

        let operator = ImportOperator::new(
            self.catalog,
            domain.id.as_str(),
            self.options.reconcile,
            self.context.clone(),
        )?;

        operator.reconcile(&mut model.enums, &mut summary)?;
        operator.reconcile(&mut model.schemas, &mut summary)?;

        let ids = model.local_ids();
        operator.resolve_stage(&mut model.events, &ids, &mut summary);
        operator.reconcile(&mut model.events, &mut summary)?;

        if !model.applications.is_empty() || !model.event_apis.is_empty() {
            let ids = model.local_ids();
            operator.resolve_stage(&mut model.applications, &ids, &mut summary);
            operator.resolve_stage(&mut model.event_apis, &ids, &mut summary);
            operator.reconcile(&mut model.applications, &mut summary)?;
            operator.reconcile(&mut model.event_apis, &mut summary)?;
        }

        if self.options.cascade_update {
            self.cascade(&operator, &model, &mut summary)?;
        }

        info!(
            objects_created = summary.objects_created(),
            versions_changed = summary.versions_changed(),
            skipped = summary.skipped().count(),
            "Import finished"
        );
        Ok(summary)
    }

    fn cascade(
        &self,
        operator: &ImportOperator<'_>,
        model: &CanonicalModel,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        info!(
            schemas = operator.remaps().schemas.len(),
            enums = operator.remaps().enums.len(),
            events = operator.remaps().events.len(),
            "Cascading superseded versions"
        );
        operator.cascade::<EventContent>(&model.version_ids(ObjectKind::Event), summary)?;
        operator.cascade::<ApplicationContent>(&model.version_ids(ObjectKind::Application), summary)?;
        operator.cascade::<EventApiContent>(&model.version_ids(ObjectKind::EventApi), summary)
    }
}
