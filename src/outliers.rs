use crate::flatten::TeamGameRow;
use crate::stats::{TRACKED_STAT_COUNT, TrackedStat};

/// Upper clip bound per tracked stat, `None` when the column was empty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipThresholds(pub [Option<f64>; TRACKED_STAT_COUNT]);

impl ClipThresholds {
    pub fn get(&self, stat: TrackedStat) -> Option<f64> {
        self.0[stat.index()]
    }
}

/// Quantile with linear interpolation between the two closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let t = pos - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    let diff = b - a;
    // Interpolate from whichever end is closer to keep the result inside [a, b].
    Some(if t >= 0.5 { b - diff * (1.0 - t) } else { a + diff * t })
}

/// Clip every tracked stat to its whole-batch `q` quantile.
///
/// Phase one gathers each column and computes its threshold, phase two applies the clip,
/// so every threshold is computed from unclipped values.
pub fn clip_outliers(rows: &mut [TeamGameRow], q: f64) -> ClipThresholds {
    let mut thresholds = ClipThresholds::default();
    let mut column = Vec::with_capacity(rows.len());
    for stat in TrackedStat::ALL {
        column.clear();
        column.extend(rows.iter().map(|row| stat.value(row)));
        thresholds.0[stat.index()] = quantile(&column, q);
    }

    for row in rows.iter_mut() {
        for stat in TrackedStat::ALL {
            if let Some(limit) = thresholds.get(stat) {
                let value = stat.value_mut(row);
                if *value > limit {
                    *value = limit;
                }
            }
        }
    }

    thresholds
}
