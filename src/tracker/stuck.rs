use super::UnitStat;

/// A unit is stuck once its dwell time strictly exceeds the expected dwell.
///
/// Pure; the latch that keeps a stuck unit stuck lives in the stat store.
pub fn is_stuck(unit: &UnitStat) -> bool {
    unit.dwell_seconds as f64 > unit.expected_dwell_seconds
}
