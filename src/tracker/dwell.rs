use super::{stats::DwellOutcome, StatStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing visible.
    Idle,
    /// Primary unit is stuck, so its dwell stays where it is.
    Frozen { unit_id: String },
    Accrued {
        unit_id: String,
        dwell_seconds: u64,
        became_stuck: bool,
    },
}

/// Advances dwell time for the single most-engaged visible unit, one logical
/// second per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwellTimer;

impl DwellTimer {
    pub fn new() -> Self {
        Self
    }

    pub fn tick(&self, store: &mut StatStore) -> TickOutcome {
        let Some(position) = primary_unit(store) else {
            return TickOutcome::Idle;
        };

        let unit_id = match store.at(position) {
            Some(unit) => unit.id.clone(),
            None => return TickOutcome::Idle,
        };

        match store.accrue_dwell(position) {
            DwellOutcome::Frozen => TickOutcome::Frozen { unit_id },
            DwellOutcome::Accrued {
                dwell_seconds,
                became_stuck,
            } => TickOutcome::Accrued {
                unit_id,
                dwell_seconds,
                became_stuck,
            },
        }
    }
}

/// Visible unit with the highest ratio. Ties go to the unit earliest in
/// document order.
pub fn primary_unit(store: &StatStore) -> Option<usize> {
    let mut primary: Option<(usize, f64)> = None;
    for (position, ratio) in store.active() {
        match primary {
            Some((_, best)) if ratio <= best => {}
            _ => primary = Some((position, ratio)),
        }
    }
    primary.map(|(position, _)| position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentUnit;
    use crate::tracker::{TrackingConfig, VisibilityChange, VisibilityTracker};

    fn words(count: usize) -> String {
        vec!["word"; count].join(" ")
    }

    fn store_with(units: &[(&str, usize)]) -> StatStore {
        let units: Vec<ContentUnit> = units
            .iter()
            .map(|(id, count)| ContentUnit::new(*id, words(*count)))
            .collect();
        StatStore::new(&units, &TrackingConfig::default())
    }

    fn show(store: &mut StatStore, changes: &[(&str, f64)]) {
        let batch: Vec<VisibilityChange> = changes
            .iter()
            .map(|(id, ratio)| VisibilityChange::new(*id, *ratio))
            .collect();
        VisibilityTracker::new().apply(store, &batch);
    }

    #[test]
    fn idle_without_visible_units() {
        let mut store = store_with(&[("a", 10)]);
        assert_eq!(DwellTimer::new().tick(&mut store), TickOutcome::Idle);
        assert_eq!(store.get("a").unwrap().dwell_seconds, 0);
    }

    #[test]
    fn only_primary_accrues() {
        let mut store = store_with(&[("a", 100), ("b", 100)]);
        show(&mut store, &[("a", 0.3), ("b", 0.8)]);

        let timer = DwellTimer::new();
        for _ in 0..5 {
            timer.tick(&mut store);
        }

        assert_eq!(store.get("a").unwrap().dwell_seconds, 0);
        assert_eq!(store.get("b").unwrap().dwell_seconds, 5);
    }

    #[test]
    fn ties_go_to_document_order() {
        let mut store = store_with(&[("a", 100), ("b", 100), ("c", 100)]);
        show(&mut store, &[("c", 0.5), ("b", 0.5)]);
        assert_eq!(primary_unit(&store), Some(1));

        show(&mut store, &[("a", 0.5)]);
        assert_eq!(primary_unit(&store), Some(0));
    }

    #[test]
    fn two_hundred_words_stuck_after_ninety_first_tick() {
        let mut store = store_with(&[("a", 200)]);
        show(&mut store, &[("a", 1.0)]);
        let timer = DwellTimer::new();

        for _ in 0..90 {
            timer.tick(&mut store);
        }
        let unit = store.get("a").unwrap();
        assert_eq!(unit.dwell_seconds, 90);
        assert!(!unit.is_stuck);

        assert_eq!(
            timer.tick(&mut store),
            TickOutcome::Accrued {
                unit_id: "a".into(),
                dwell_seconds: 91,
                became_stuck: true,
            }
        );
        assert!(store.get("a").unwrap().is_stuck);
    }

    #[test]
    fn stuck_unit_freezes_and_keeps_primacy() {
        let mut store = store_with(&[("a", 0), ("b", 100)]);
        show(&mut store, &[("a", 0.9), ("b", 0.2)]);
        let timer = DwellTimer::new();

        timer.tick(&mut store);
        assert!(store.get("a").unwrap().is_stuck);

        for _ in 0..3 {
            assert_eq!(
                timer.tick(&mut store),
                TickOutcome::Frozen { unit_id: "a".into() }
            );
        }
        assert_eq!(store.get("a").unwrap().dwell_seconds, 1);
        assert_eq!(store.get("b").unwrap().dwell_seconds, 0);
    }
}
