//! Growths: one orchestrated processing step with an explicit lifecycle
//!
//! `begin` submits work for the configured process and moves a growth to
//! PROCESSING. `finish` collects the results, merges successes into the output
//! organism, retains per-item errors and ends in COMPLETE or PARTIAL. A failure
//! of the task itself ends in ERROR and is returned to the caller.
//!
//! Nothing in this module cancels or times out a growth. A growth stuck in
//! PROCESSING stays there until an operator calls [`GrowthEngine::reset`],
//! which aborts its task and moves it to RETRY.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GrowthConfig;
use crate::error::{Error, Result};
use crate::organism::EntityRef;
use crate::processor::{ProcessId, TaskHandle};

pub mod driver;
pub mod engine;
pub mod merge;
pub mod state;

pub use driver::{DriverReport, GrowthDriver};
pub use engine::{GrowthEngine, GrowthResult};
pub use merge::{ContributeType, Contribution};
pub use state::{validate_transition, GrowthState};

pub type GrowthId = u64;

/// One processing step between an input and an output organism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Growth {
    pub id: GrowthId,
    pub community: EntityRef,
    #[serde(default)]
    pub input: Option<EntityRef>,
    output: EntityRef,
    /// Free-form label of the growth phase
    #[serde(rename = "type", default)]
    pub phase: String,
    #[serde(default)]
    pub config: GrowthConfig,
    pub process: ProcessId,
    pub contribute: ProcessId,
    pub contribute_type: ContributeType,
    #[serde(default)]
    result_id: Option<TaskHandle>,
    state: GrowthState,
    #[serde(default)]
    is_finished: bool,
    /// Whether the output organism received this attempt's records
    #[serde(default)]
    merged: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Growth {
    pub fn new(
        id: GrowthId,
        community: EntityRef,
        input: Option<EntityRef>,
        output: EntityRef,
        process: ProcessId,
        contribute: ProcessId,
        contribute_type: ContributeType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            community,
            input,
            output,
            phase: String::new(),
            config: GrowthConfig::default(),
            process,
            contribute,
            contribute_type,
            result_id: None,
            state: GrowthState::New,
            is_finished: false,
            merged: false,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_config(mut self, config: GrowthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// The organism results are merged into; fixed at creation
    pub fn output(&self) -> EntityRef {
        self.output
    }

    pub fn state(&self) -> GrowthState {
        self.state
    }

    /// Finished as of the last save
    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    pub fn result_id(&self) -> Option<&TaskHandle> {
        self.result_id.as_ref()
    }

    /// Configuration without private keys
    pub fn public_config(&self) -> Value {
        self.config.to_public_value()
    }

    pub fn view(&self) -> GrowthView {
        GrowthView {
            id: self.id,
            community: self.community,
            input: self.input,
            output: self.output,
            phase: self.phase.clone(),
            config: self.public_config(),
            process: self.process.to_string(),
            contribute: self.contribute.to_string(),
            contribute_type: self.contribute_type,
            result_id: self.result_id.clone(),
            state: self.state,
            is_finished: self.is_finished,
        }
    }

    pub(crate) fn transition(&mut self, to: GrowthState, action: &'static str) -> Result<()> {
        if !validate_transition(self.state, to) {
            return Err(Error::illegal_transition(self.id, self.state, action));
        }
        self.state = to;
        self.modified_at = Utc::now();
        Ok(())
    }

    pub(crate) fn is_merged(&self) -> bool {
        self.merged
    }

    pub(crate) fn set_merged(&mut self, merged: bool) {
        self.merged = merged;
    }

    pub(crate) fn set_result_id(&mut self, handle: Option<TaskHandle>) {
        self.result_id = handle;
    }

    /// Recompute derived fields before persisting
    pub(crate) fn refresh(&mut self) {
        self.is_finished = self.state.is_finished();
    }
}

/// Growth as shown outside the processor boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthView {
    pub id: GrowthId,
    pub community: EntityRef,
    pub input: Option<EntityRef>,
    pub output: EntityRef,
    #[serde(rename = "type")]
    pub phase: String,
    pub config: Value,
    pub process: String,
    pub contribute: String,
    pub contribute_type: ContributeType,
    pub result_id: Option<TaskHandle>,
    pub state: GrowthState,
    pub is_finished: bool,
}
