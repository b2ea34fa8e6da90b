//! Drives growths through begin, finish and reset

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::merge;
use super::{Growth, GrowthId, GrowthState};
use crate::config::{DatagrowthConfig, GrowthConfig};
use crate::error::{Error, Result};
use crate::organism::{Arguments, Kwargs, Organism, ReferenceTable};
use crate::processor::{
    ErrorRecord, ProcessId, Processor, ProcessorContext, ProcessorRegistry, TaskBackend,
    TaskStatus, TokioTaskBackend,
};
use crate::resource::ResourceRegistry;
use crate::storage::{ErrorStore, GrowthStore, KeyedLocks};

/// What `finish` hands back: the output organism and the errors retained so far
pub struct GrowthResult {
    pub output: Arc<dyn Organism>,
    pub retained: Vec<ErrorRecord>,
}

impl std::fmt::Debug for GrowthResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowthResult")
            .field("output", &self.output.entity())
            .field("retained", &self.retained.len())
            .finish()
    }
}

/// Orchestrates growths against stores, organisms and processors
pub struct GrowthEngine {
    growths: Arc<dyn GrowthStore>,
    errors: Arc<dyn ErrorStore>,
    references: Arc<ReferenceTable>,
    processors: Arc<ProcessorRegistry>,
    resources: Arc<ResourceRegistry>,
    tasks: Arc<dyn TaskBackend>,
    defaults: Kwargs,
    concurrency: usize,
    locks: KeyedLocks<GrowthId>,
}

impl GrowthEngine {
    /// Engine with the built-in processors and a tokio task backend
    pub fn new(
        growths: Arc<dyn GrowthStore>,
        errors: Arc<dyn ErrorStore>,
        references: ReferenceTable,
    ) -> Self {
        let settings = DatagrowthConfig::default();
        Self {
            growths,
            errors,
            references: Arc::new(references),
            processors: Arc::new(ProcessorRegistry::with_builtins()),
            resources: Arc::new(ResourceRegistry::new()),
            tasks: Arc::new(TokioTaskBackend::new()),
            defaults: settings.growth,
            concurrency: settings.tasks.concurrency,
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_processors(mut self, processors: ProcessorRegistry) -> Self {
        self.processors = Arc::new(processors);
        self
    }

    pub fn with_resources(mut self, resources: ResourceRegistry) -> Self {
        self.resources = Arc::new(resources);
        self
    }

    pub fn with_tasks(mut self, tasks: Arc<dyn TaskBackend>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Take growth defaults and batch concurrency from crate settings
    pub fn with_settings(mut self, settings: &DatagrowthConfig) -> Self {
        self.defaults = settings.growth.clone();
        self.concurrency = settings.tasks.concurrency;
        self
    }

    /// Configuration handed to processors, namespace defaults filled in
    pub fn effective_config(&self, growth: &Growth) -> GrowthConfig {
        growth.config.clone().merged_with(&self.defaults)
    }

    fn processor(&self, process: &ProcessId, config: GrowthConfig) -> Result<Arc<dyn Processor>> {
        let context = ProcessorContext {
            config,
            tasks: Arc::clone(&self.tasks),
            resources: Arc::clone(&self.resources),
            concurrency: self.concurrency,
        };
        self.processors.resolve(process, context)
    }

    /// Persist a growth, recomputing derived fields
    pub async fn save(&self, growth: &mut Growth) -> Result<()> {
        growth.refresh();
        self.growths.save(growth).await
    }

    pub async fn load(&self, id: GrowthId) -> Result<Growth> {
        self.growths
            .load(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Growth {}", id)))
    }

    pub async fn list(&self, state: GrowthState) -> Result<Vec<Growth>> {
        self.growths.list_by_state(state).await
    }

    /// Submit the work of a NEW or RETRY growth and move it to PROCESSING.
    ///
    /// Fails without changing the growth when the process cannot be resolved
    /// or the arguments are rejected.
    pub async fn begin(&self, growth: &mut Growth) -> Result<()> {
        if !growth.state().can_begin() {
            return Err(Error::illegal_transition(growth.id, growth.state(), "begin"));
        }

        let config = self.effective_config(growth);
        let processor = self.processor(&growth.process, config.clone())?;
        let arguments = match &growth.input {
            Some(input) => {
                let organism = self.references.resolve(input).await?;
                organism.output(&config.args, &config.kwargs).await?
            }
            None => Arguments::single(config.args.clone(), config.kwargs.clone()),
        };
        debug!(growth = growth.id, invocations = arguments.len(), "Extracted arguments");

        let handle = processor.submit(growth.process.operation, arguments).await?;
        info!(growth = growth.id, task = %handle, process = %growth.process, "Growth began");

        growth.set_result_id(Some(handle));
        growth.transition(GrowthState::Processing, "begin")?;
        self.save(growth).await
    }

    /// Collect, merge and retain the results of a PROCESSING growth.
    ///
    /// A finished growth returns its output and retained errors again without
    /// merging a second time. The output is updated at most once: a growth
    /// whose merge was saved but whose final save failed skips the update when
    /// finished again. A failed task moves the growth to ERROR, which is saved
    /// before the failure is returned. Task results are released once the
    /// growth has been saved in its final state.
    pub async fn finish(&self, growth: &mut Growth) -> Result<GrowthResult> {
        match growth.state() {
            GrowthState::Complete | GrowthState::Partial => {
                debug!(growth = growth.id, "Growth already finished");
                return self.result(growth).await;
            }
            GrowthState::Processing => {}
            state => return Err(Error::illegal_transition(growth.id, state, "finish")),
        }

        let config = self.effective_config(growth);
        let processor = self.processor(&growth.process, config.clone())?;

        let collected = match growth.result_id().cloned() {
            Some(handle) => processor.collect(&handle).await,
            None => Err(Error::processor(format!(
                "Growth {} is processing without a result handle",
                growth.id
            ))),
        };
        let outcome = match collected {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(growth = growth.id, "Growth task failed: {}", e);
                growth.transition(GrowthState::Error, "finish")?;
                self.save(growth).await?;
                self.forget_task(growth).await?;
                return Err(e);
            }
        };

        let contributor = self.processor(&growth.contribute, config)?;
        let contribution = merge::contribute(
            growth.contribute_type,
            contributor.as_ref(),
            growth.contribute.operation,
            outcome.successes,
        )
        .await?;
        let output = self.references.resolve(&growth.output()).await?;

        // Record ids are stable across attempts, retaining again keeps one copy
        let failures: Vec<ErrorRecord> = outcome
            .errors
            .into_iter()
            .chain(contribution.errors)
            .collect();
        let retained = failures.len();
        for record in failures {
            self.errors.retain(record, growth.id).await?;
        }

        let records = contribution.records.len();
        if growth.is_merged() {
            debug!(growth = growth.id, "Output already updated by an earlier attempt");
        } else {
            growth.set_merged(true);
            self.save(growth).await?;
            if let Err(e) = output.update(contribution.records).await {
                growth.set_merged(false);
                if let Err(save) = self.save(growth).await {
                    warn!(growth = growth.id, "Failed to clear merge marker: {}", save);
                }
                return Err(e);
            }
        }

        let state = if retained == 0 {
            GrowthState::Complete
        } else {
            warn!(growth = growth.id, errors = retained, "Growth finished with errors");
            GrowthState::Partial
        };
        growth.transition(state, "finish")?;
        self.save(growth).await?;
        self.forget_task(growth).await?;
        info!(growth = growth.id, records, state = %state, "Growth finished");

        Ok(GrowthResult {
            output,
            retained: self.errors.retained(growth.id).await?,
        })
    }

    /// Release the task results once the growth no longer needs them
    async fn forget_task(&self, growth: &Growth) -> Result<()> {
        match growth.result_id() {
            Some(handle) => self.tasks.forget(handle).await,
            None => Ok(()),
        }
    }

    async fn result(&self, growth: &Growth) -> Result<GrowthResult> {
        Ok(GrowthResult {
            output: self.references.resolve(&growth.output()).await?,
            retained: self.errors.retained(growth.id).await?,
        })
    }

    /// Move a PROCESSING or ERROR growth to RETRY so it can begin again.
    ///
    /// A task still running for the growth is aborted.
    pub async fn reset(&self, growth: &mut Growth) -> Result<()> {
        if !growth.state().can_reset() {
            return Err(Error::illegal_transition(growth.id, growth.state(), "reset"));
        }
        self.forget_task(growth).await?;
        growth.set_result_id(None);
        growth.set_merged(false);
        growth.transition(GrowthState::Retry, "reset")?;
        info!(growth = growth.id, "Growth reset for retry");
        self.save(growth).await
    }

    /// Whether `finish` can run without waiting on the task
    pub async fn is_ready(&self, growth: &Growth) -> Result<bool> {
        match (growth.state(), growth.result_id()) {
            (GrowthState::Complete | GrowthState::Partial, _) => Ok(true),
            (GrowthState::Processing, Some(handle)) => {
                Ok(self.tasks.poll(handle).await? == TaskStatus::Ready)
            }
            (GrowthState::Processing, None) => Ok(true),
            _ => Ok(false),
        }
    }

    /// Load, begin and save a stored growth under its lock
    pub async fn begin_by_id(&self, id: GrowthId) -> Result<Growth> {
        let _guard = self.locks.lock(&id).await;
        let mut growth = self.load(id).await?;
        self.begin(&mut growth).await?;
        Ok(growth)
    }

    /// Load and finish a stored growth under its lock
    pub async fn finish_by_id(&self, id: GrowthId) -> Result<(Growth, GrowthResult)> {
        let _guard = self.locks.lock(&id).await;
        let mut growth = self.load(id).await?;
        let result = self.finish(&mut growth).await?;
        Ok((growth, result))
    }

    pub async fn reset_by_id(&self, id: GrowthId) -> Result<Growth> {
        let _guard = self.locks.lock(&id).await;
        let mut growth = self.load(id).await?;
        self.reset(&mut growth).await?;
        Ok(growth)
    }
}
