use log::debug;
use serde::{Deserialize, Serialize};

use super::StatStore;

/// Visibility ratio of one unit as reported by the rendering surface.
/// A ratio of zero (or anything non-finite) means the unit left the viewport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityChange {
    pub unit_id: String,
    pub ratio: f64,
}

impl VisibilityChange {
    pub fn new(unit_id: impl Into<String>, ratio: f64) -> Self {
        Self {
            unit_id: unit_id.into(),
            ratio,
        }
    }

    pub fn hidden(unit_id: impl Into<String>) -> Self {
        Self::new(unit_id, 0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub entered: Vec<String>,
    pub left: Vec<String>,
    pub ignored: usize,
}

impl BatchOutcome {
    pub fn changed_membership(&self) -> bool {
        !self.entered.is_empty() || !self.left.is_empty()
    }
}

/// Maintains the active set from batched visibility changes.
///
/// Touches presence only: view counts and active-set membership.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityTracker;

impl VisibilityTracker {
    pub fn new() -> Self {
        Self
    }

    /// Applies a whole batch before returning so no caller can observe a
    /// half-applied active set. Within a batch later entries win.
    pub fn apply(&self, store: &mut StatStore, batch: &[VisibilityChange]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for change in batch {
            let Some(position) = store.position(&change.unit_id) else {
                debug!("ignoring visibility change for unknown unit {}", change.unit_id);
                outcome.ignored += 1;
                continue;
            };

            match normalize_ratio(change.ratio) {
                Some(ratio) => {
                    if store.mark_visible(position, ratio) {
                        outcome.entered.push(change.unit_id.clone());
                    }
                }
                None => {
                    if store.mark_hidden(position) {
                        outcome.left.push(change.unit_id.clone());
                    }
                }
            }
        }

        outcome
    }
}

fn normalize_ratio(ratio: f64) -> Option<f64> {
    if ratio.is_finite() && ratio > 0.0 {
        Some(ratio.min(1.0))
    } else {
        None
    }
}
