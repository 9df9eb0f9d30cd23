use std::collections::HashSet;

use anyhow::{anyhow, bail, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::tracker::StatStore;

use super::{fallback_check, AnswerOutcome, CheckError, CheckRequest, ComprehensionCheck};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum QuizState {
    #[default]
    Idle,
    Awaiting,
    ShowingCheck,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Awaiting { unit_id: String },
    Showing { unit_id: String, check: ComprehensionCheck },
}

/// Decides when a stuck unit gets a comprehension check.
///
/// Reads the stat store and owns only the checked set and the session
/// counters. At most one request is in flight, a unit id is requested at most
/// once per session, and nothing is requested while silenced, while a check is
/// on screen, or after the session cap.
#[derive(Debug, Clone)]
pub struct QuizOrchestrator {
    phase: Phase,
    checked: HashSet<String>,
    quiz_count: u32,
    max_quizzes: u32,
    silenced: bool,
}

impl QuizOrchestrator {
    pub fn new(max_quizzes: u32) -> Self {
        Self {
            phase: Phase::Idle,
            checked: HashSet::new(),
            quiz_count: 0,
            max_quizzes,
            silenced: false,
        }
    }

    pub fn state(&self) -> QuizState {
        match self.phase {
            Phase::Idle => QuizState::Idle,
            Phase::Awaiting { .. } => QuizState::Awaiting,
            Phase::Showing { .. } => QuizState::ShowingCheck,
        }
    }

    pub fn check_in_flight(&self) -> bool {
        matches!(self.phase, Phase::Awaiting { .. })
    }

    pub fn in_flight_unit(&self) -> Option<&str> {
        match &self.phase {
            Phase::Awaiting { unit_id } => Some(unit_id.as_str()),
            _ => None,
        }
    }

    pub fn quiz_count(&self) -> u32 {
        self.quiz_count
    }

    pub fn max_quizzes(&self) -> u32 {
        self.max_quizzes
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    pub fn is_checked(&self, unit_id: &str) -> bool {
        self.checked.contains(unit_id)
    }

    pub fn current_check(&self) -> Option<(&str, &ComprehensionCheck)> {
        match &self.phase {
            Phase::Showing { unit_id, check } => Some((unit_id.as_str(), check)),
            _ => None,
        }
    }

    pub fn set_silenced(&mut self, silenced: bool) {
        if self.silenced != silenced {
            info!("Do-not-disturb {}", if silenced { "on" } else { "off" });
        }
        self.silenced = silenced;
    }

    /// Idle to awaiting, if anything qualifies. The chosen unit joins the
    /// checked set before the request leaves, so re-evaluation can never pick
    /// it again.
    pub fn evaluate(&mut self, store: &StatStore) -> Option<CheckRequest> {
        if self.phase != Phase::Idle || self.silenced || self.quiz_count >= self.max_quizzes {
            return None;
        }

        let (unit_id, unit_text) = store
            .stuck_positions()
            .filter_map(|pos| Some((store.at(pos)?, store.text_at(pos)?)))
            .find(|(unit, _)| !self.checked.contains(&unit.id))
            .map(|(unit, text)| (unit.id.clone(), text.to_string()))?;

        self.checked.insert(unit_id.clone());
        self.phase = Phase::Awaiting {
            unit_id: unit_id.clone(),
        };

        info!(
            "Requesting comprehension check {} of {} for unit {}",
            self.quiz_count + 1,
            self.max_quizzes,
            unit_id
        );

        Some(CheckRequest { unit_id, unit_text })
    }

    /// Awaiting to showing. Any failure, or a check that is not well formed,
    /// is replaced by the unit's fallback check. Completions that do not match
    /// the in-flight unit are dropped.
    pub fn complete(
        &mut self,
        unit_id: &str,
        result: Result<ComprehensionCheck, CheckError>,
    ) -> Option<&ComprehensionCheck> {
        match &self.phase {
            Phase::Awaiting { unit_id: pending } if pending == unit_id => {}
            _ => {
                warn!("Dropping check completion for unit {unit_id}: not in flight");
                return None;
            }
        }

        let check = match result {
            Ok(check) if check.is_well_formed() => check,
            Ok(_) => {
                warn!("Generated check for unit {unit_id} is malformed; using fallback");
                fallback_check(unit_id)
            }
            Err(err) => {
                warn!("Check generation failed for unit {unit_id}: {err}; using fallback");
                fallback_check(unit_id)
            }
        };

        self.quiz_count += 1;
        self.phase = Phase::Showing {
            unit_id: unit_id.to_string(),
            check,
        };

        self.current_check().map(|(_, check)| check)
    }

    pub fn answer(&self, selected: usize) -> Result<AnswerOutcome> {
        let Some((_, check)) = self.current_check() else {
            bail!("no comprehension check is being shown");
        };
        check.evaluate(selected).ok_or_else(|| {
            anyhow!(
                "option {selected} out of range (check has {} options)",
                check.options.len()
            )
        })
    }

    /// Closes the check on screen. Returns false if none was shown.
    pub fn dismiss(&mut self) -> bool {
        if matches!(self.phase, Phase::Showing { .. }) {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentUnit;
    use crate::tracker::{DwellTimer, TrackingConfig, VisibilityChange, VisibilityTracker};

    /// Store where every listed unit is empty and therefore stuck after one tick.
    fn stuck_store(ids: &[&str]) -> StatStore {
        let units: Vec<ContentUnit> = ids.iter().map(|id| ContentUnit::new(*id, "")).collect();
        let mut store = StatStore::new(&units, &TrackingConfig::default());
        let tracker = VisibilityTracker::new();
        let timer = DwellTimer::new();
        for id in ids {
            tracker.apply(&mut store, &[VisibilityChange::new(*id, 1.0)]);
            timer.tick(&mut store);
            tracker.apply(&mut store, &[VisibilityChange::hidden(*id)]);
        }
        store
    }

    fn generated() -> ComprehensionCheck {
        ComprehensionCheck {
            question: "Generated?".into(),
            options: vec!["yes".into(), "no".into()],
            correct_option_index: 0,
            explanation: "it was".into(),
        }
    }

    #[test]
    fn nothing_stuck_stays_idle() {
        let units = vec![ContentUnit::new("a", "some words")];
        let store = StatStore::new(&units, &TrackingConfig::default());
        let mut orchestrator = QuizOrchestrator::new(3);
        assert!(orchestrator.evaluate(&store).is_none());
        assert_eq!(orchestrator.state(), QuizState::Idle);
    }

    #[test]
    fn one_request_at_a_time_in_document_order() {
        let store = stuck_store(&["a", "b"]);
        let mut orchestrator = QuizOrchestrator::new(3);

        let first = orchestrator.evaluate(&store).unwrap();
        assert_eq!(first.unit_id, "a");
        assert!(orchestrator.check_in_flight());
        assert!(orchestrator.is_checked("a"));

        // Re-entrant trigger while awaiting is a no-op
        assert!(orchestrator.evaluate(&store).is_none());

        orchestrator.complete("a", Ok(generated()));
        assert_eq!(orchestrator.state(), QuizState::ShowingCheck);
        assert!(orchestrator.evaluate(&store).is_none());

        assert!(orchestrator.dismiss());
        let second = orchestrator.evaluate(&store).unwrap();
        assert_eq!(second.unit_id, "b");
    }

    #[test]
    fn unit_is_never_requested_twice() {
        let store = stuck_store(&["a"]);
        let mut orchestrator = QuizOrchestrator::new(3);

        orchestrator.evaluate(&store).unwrap();
        orchestrator.complete("a", Ok(generated()));
        orchestrator.dismiss();

        assert!(orchestrator.evaluate(&store).is_none());
        assert_eq!(orchestrator.quiz_count(), 1);
    }

    #[test]
    fn failure_shows_fallback_and_counts() {
        let store = stuck_store(&["section_2"]);
        let mut orchestrator = QuizOrchestrator::new(3);
        orchestrator.evaluate(&store).unwrap();

        let check = orchestrator
            .complete("section_2", Err(CheckError::Malformed("bad".into())))
            .cloned()
            .unwrap();
        assert_eq!(check, fallback_check("section_2"));
        assert_eq!(orchestrator.quiz_count(), 1);
        assert!(!orchestrator.check_in_flight());
    }

    #[test]
    fn malformed_success_is_replaced() {
        let store = stuck_store(&["a"]);
        let mut orchestrator = QuizOrchestrator::new(3);
        orchestrator.evaluate(&store).unwrap();

        let mut broken = generated();
        broken.correct_option_index = 7;
        let check = orchestrator.complete("a", Ok(broken)).cloned().unwrap();
        assert_eq!(check, fallback_check("a"));
    }

    #[test]
    fn stale_completion_is_dropped() {
        let store = stuck_store(&["a"]);
        let mut orchestrator = QuizOrchestrator::new(3);
        assert!(orchestrator.complete("a", Ok(generated())).is_none());

        orchestrator.evaluate(&store).unwrap();
        assert!(orchestrator.complete("other", Ok(generated())).is_none());
        assert!(orchestrator.check_in_flight());
        assert_eq!(orchestrator.quiz_count(), 0);
    }

    #[test]
    fn cap_stops_further_requests() {
        let store = stuck_store(&["a", "b", "c", "d"]);
        let mut orchestrator = QuizOrchestrator::new(3);

        for expected in ["a", "b", "c"] {
            let request = orchestrator.evaluate(&store).unwrap();
            assert_eq!(request.unit_id, expected);
            orchestrator.complete(expected, Err(CheckError::Aborted("test".into())));
            orchestrator.dismiss();
        }

        assert_eq!(orchestrator.quiz_count(), 3);
        assert!(orchestrator.evaluate(&store).is_none());
        assert!(!orchestrator.is_checked("d"));
    }

    #[test]
    fn silence_blocks_until_lifted() {
        let store = stuck_store(&["a"]);
        let mut orchestrator = QuizOrchestrator::new(3);
        orchestrator.set_silenced(true);
        assert!(orchestrator.evaluate(&store).is_none());
        assert!(!orchestrator.is_checked("a"));

        orchestrator.set_silenced(false);
        assert_eq!(orchestrator.evaluate(&store).unwrap().unit_id, "a");
    }

    #[test]
    fn answers_only_while_showing() {
        let store = stuck_store(&["a"]);
        let mut orchestrator = QuizOrchestrator::new(3);
        assert!(orchestrator.answer(0).is_err());

        orchestrator.evaluate(&store).unwrap();
        orchestrator.complete("a", Ok(generated()));
        assert!(orchestrator.answer(0).unwrap().correct);
        assert!(!orchestrator.answer(1).unwrap().correct);
        assert!(orchestrator.answer(2).is_err());
        assert_eq!(orchestrator.state(), QuizState::ShowingCheck);
    }
}
