use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    models::ContentUnit,
    quiz::{AnswerOutcome, CheckError, CheckRequest, ComprehensionCheck, QuizOrchestrator, QuizState},
    tracker::{
        BatchOutcome, DwellTimer, StatStore, TickOutcome, TrackingConfig, UnitStat,
        VisibilityChange, VisibilityTracker,
    },
};

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Bumped every time the content-unit list is replaced.
    pub generation: u64,
    /// Unit stats in document order, which is the order the reader renders
    /// them in. [`SessionSnapshot::units_by_id`] gives the keyed view.
    pub units: Vec<UnitStat>,
    pub active_unit_ids: Vec<String>,
    pub checked_unit_ids: Vec<String>,
    pub quiz_state: QuizState,
    pub current_check: Option<ComprehensionCheck>,
    pub current_check_unit_id: Option<String>,
    pub quiz_count: u32,
    pub max_quizzes: u32,
    pub silenced: bool,
}

impl SessionSnapshot {
    pub fn unit(&self, id: &str) -> Option<&UnitStat> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn units_by_id(&self) -> HashMap<&str, &UnitStat> {
        self.units.iter().map(|unit| (unit.id.as_str(), unit)).collect()
    }
}

/// Everything one content-unit list owns: the stat store plus the components
/// that act on it.
///
/// Every entry point applies its event, then gives the orchestrator one
/// chance to start a request, which the caller must dispatch.
pub struct ReadingSession {
    generation: u64,
    /// Bumped on every change visible in a snapshot.
    revision: u64,
    store: StatStore,
    visibility: VisibilityTracker,
    dwell: DwellTimer,
    orchestrator: QuizOrchestrator,
}

impl ReadingSession {
    pub fn new(generation: u64, units: &[ContentUnit], config: &TrackingConfig) -> Self {
        Self {
            generation,
            revision: 0,
            store: StatStore::new(units, config),
            visibility: VisibilityTracker::new(),
            dwell: DwellTimer::new(),
            orchestrator: QuizOrchestrator::new(config.max_checks_per_session),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn store(&self) -> &StatStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &QuizOrchestrator {
        &self.orchestrator
    }

    pub fn apply_visibility(
        &mut self,
        batch: &[VisibilityChange],
    ) -> (BatchOutcome, Option<CheckRequest>) {
        let outcome = self.visibility.apply(&mut self.store, batch);
        if outcome.changed_membership() {
            self.touch();
        }
        (outcome, self.evaluate())
    }

    pub fn tick(&mut self) -> (TickOutcome, Option<CheckRequest>) {
        let outcome = self.dwell.tick(&mut self.store);
        if matches!(outcome, TickOutcome::Accrued { .. }) {
            self.touch();
        }
        (outcome, self.evaluate())
    }

    /// Settles the in-flight request. The returned request, if any, is the
    /// next one to dispatch; it can only appear once the shown check is
    /// dismissed, so it is normally `None` here.
    pub fn complete_check(
        &mut self,
        unit_id: &str,
        result: Result<ComprehensionCheck, CheckError>,
    ) -> Option<CheckRequest> {
        if self.orchestrator.complete(unit_id, result).is_some() {
            self.touch();
        }
        self.evaluate()
    }

    pub fn set_silenced(&mut self, silenced: bool) -> Option<CheckRequest> {
        if self.orchestrator.is_silenced() != silenced {
            self.touch();
        }
        self.orchestrator.set_silenced(silenced);
        self.evaluate()
    }

    pub fn toggle_silenced(&mut self) -> (bool, Option<CheckRequest>) {
        let silenced = !self.orchestrator.is_silenced();
        (silenced, self.set_silenced(silenced))
    }

    pub fn answer_check(&self, selected: usize) -> Result<AnswerOutcome> {
        self.orchestrator.answer(selected)
    }

    pub fn dismiss_check(&mut self) -> (bool, Option<CheckRequest>) {
        let dismissed = self.orchestrator.dismiss();
        if dismissed {
            self.touch();
        }
        (dismissed, self.evaluate())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let units = self.store.units().to_vec();
        let checked_unit_ids = units
            .iter()
            .filter(|unit| self.orchestrator.is_checked(&unit.id))
            .map(|unit| unit.id.clone())
            .collect();
        let current = self.orchestrator.current_check();

        SessionSnapshot {
            generation: self.generation,
            active_unit_ids: self.store.active_ids(),
            checked_unit_ids,
            quiz_state: self.orchestrator.state(),
            current_check: current.map(|(_, check)| check.clone()),
            current_check_unit_id: current.map(|(unit_id, _)| unit_id.to_string()),
            quiz_count: self.orchestrator.quiz_count(),
            max_quizzes: self.orchestrator.max_quizzes(),
            silenced: self.orchestrator.is_silenced(),
            units,
        }
    }

    fn evaluate(&mut self) -> Option<CheckRequest> {
        let request = self.orchestrator.evaluate(&self.store);
        if request.is_some() {
            self.touch();
        }
        request
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
