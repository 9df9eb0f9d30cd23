use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::ContentUnit;

use super::{stuck::is_stuck, TrackingConfig};

/// Tracking state of one content unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitStat {
    pub id: String,
    pub word_count: u32,
    pub expected_dwell_seconds: f64,
    pub dwell_seconds: u64,
    pub view_count: u32,
    pub is_stuck: bool,
}

impl UnitStat {
    fn new(unit: &ContentUnit, config: &TrackingConfig) -> Self {
        let word_count = unit.word_count();
        Self {
            id: unit.id.clone(),
            word_count,
            expected_dwell_seconds: config.expected_dwell_seconds(word_count),
            dwell_seconds: 0,
            view_count: 0,
            is_stuck: false,
        }
    }
}

/// Result of accruing one dwell second on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellOutcome {
    /// Unit was already stuck; dwell stays frozen.
    Frozen,
    Accrued { dwell_seconds: u64, became_stuck: bool },
}

/// Authoritative per-unit tracking state for one content-unit list.
///
/// Units are addressed by their position in document order. The active set
/// and the stuck set are kept incrementally so neither the tick nor the
/// orchestrator has to rescan every unit.
#[derive(Debug, Clone, Default)]
pub struct StatStore {
    units: Vec<UnitStat>,
    texts: Vec<String>,
    index: HashMap<String, usize>,
    active: BTreeMap<usize, f64>,
    stuck: BTreeSet<usize>,
}

impl StatStore {
    /// Builds one entry per unit. Later duplicates of an id are ignored.
    pub fn new(units: &[ContentUnit], config: &TrackingConfig) -> Self {
        let mut store = Self::default();
        for unit in units {
            if store.index.contains_key(&unit.id) {
                continue;
            }
            store.index.insert(unit.id.clone(), store.units.len());
            store.units.push(UnitStat::new(unit, config));
            store.texts.push(unit.text.clone());
        }
        store
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&UnitStat> {
        self.position(id).map(|pos| &self.units[pos])
    }

    pub fn at(&self, position: usize) -> Option<&UnitStat> {
        self.units.get(position)
    }

    pub fn text_at(&self, position: usize) -> Option<&str> {
        self.texts.get(position).map(String::as_str)
    }

    pub fn units(&self) -> &[UnitStat] {
        &self.units
    }

    /// Visible units in document order with their visibility ratio.
    pub fn active(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.active.iter().map(|(pos, ratio)| (*pos, *ratio))
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, position: usize) -> bool {
        self.active.contains_key(&position)
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.active
            .keys()
            .map(|pos| self.units[*pos].id.clone())
            .collect()
    }

    /// Stuck units in document order.
    pub fn stuck_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.stuck.iter().copied()
    }

    /// Adds or refreshes a visible unit. Returns true on a not-visible to
    /// visible transition, which is also the only time `view_count` grows.
    pub(crate) fn mark_visible(&mut self, position: usize, ratio: f64) -> bool {
        let entered = self.active.insert(position, ratio).is_none();
        if entered {
            self.units[position].view_count += 1;
        }
        entered
    }

    pub(crate) fn mark_hidden(&mut self, position: usize) -> bool {
        self.active.remove(&position).is_some()
    }

    /// Single mutation site for dwell time and the stuck latch.
    pub(crate) fn accrue_dwell(&mut self, position: usize) -> DwellOutcome {
        let unit = &mut self.units[position];
        if unit.is_stuck {
            return DwellOutcome::Frozen;
        }

        unit.dwell_seconds += 1;
        let became_stuck = is_stuck(unit);
        if became_stuck {
            unit.is_stuck = true;
            self.stuck.insert(position);
        }

        DwellOutcome::Accrued {
            dwell_seconds: unit.dwell_seconds,
            became_stuck,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(count: usize) -> String {
        vec!["word"; count].join(" ")
    }

    #[test]
    fn derives_word_count_and_threshold_once() {
        let units = vec![
            ContentUnit::new("a", words(200)),
            ContentUnit::new("b", "  spaced\tout \n text  "),
            ContentUnit::new("c", ""),
        ];
        let store = StatStore::new(&units, &TrackingConfig::default());

        let a = store.get("a").unwrap();
        assert_eq!(a.word_count, 200);
        assert_eq!(a.expected_dwell_seconds, 90.0);

        let b = store.get("b").unwrap();
        assert_eq!(b.word_count, 3);
        assert_eq!(b.expected_dwell_seconds, (3.0 / 200.0) * 60.0 * 1.5);

        let c = store.get("c").unwrap();
        assert_eq!(c.word_count, 0);
        assert_eq!(c.expected_dwell_seconds, 0.0);
    }

    #[test]
    fn duplicate_ids_keep_first_entry() {
        let units = vec![
            ContentUnit::new("a", "one"),
            ContentUnit::new("a", "one two three"),
        ];
        let store = StatStore::new(&units, &TrackingConfig::default());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().word_count, 1);
    }

    #[test]
    fn view_count_grows_only_on_entry() {
        let units = vec![ContentUnit::new("a", "text")];
        let mut store = StatStore::new(&units, &TrackingConfig::default());

        assert!(store.mark_visible(0, 0.3));
        assert!(!store.mark_visible(0, 0.9));
        assert_eq!(store.get("a").unwrap().view_count, 1);

        assert!(store.mark_hidden(0));
        assert!(!store.mark_hidden(0));
        assert!(store.mark_visible(0, 0.5));
        assert_eq!(store.get("a").unwrap().view_count, 2);
    }

    #[test]
    fn empty_unit_latches_on_first_dwell_second() {
        let units = vec![ContentUnit::new("empty", "")];
        let mut store = StatStore::new(&units, &TrackingConfig::default());

        assert_eq!(
            store.accrue_dwell(0),
            DwellOutcome::Accrued {
                dwell_seconds: 1,
                became_stuck: true
            }
        );
        assert_eq!(store.accrue_dwell(0), DwellOutcome::Frozen);
        assert_eq!(store.get("empty").unwrap().dwell_seconds, 1);
        assert_eq!(store.stuck_positions().collect::<Vec<_>>(), vec![0]);
    }
}
