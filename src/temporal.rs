use std::collections::{HashMap, VecDeque};

use crate::config::PipelineConfig;
use crate::flatten::TeamGameRow;
use crate::stats::{TRACKED_STAT_COUNT, TrackedStat};

/// Trailing means over one window size. Only games strictly before the current one count.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    pub window: usize,
    /// Indexed by [`TrackedStat::index`]; `None` when the team has no prior game this season.
    pub means: [Option<f64>; TRACKED_STAT_COUNT],
    pub pp_efficiency: Option<f64>,
}

impl RollingWindow {
    pub fn mean(&self, stat: TrackedStat) -> Option<f64> {
        self.means[stat.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalFeatures {
    pub cum_wins: f64,
    pub cum_games: usize,
    pub season_win_pct: f64,
    pub rest_days: f64,
    /// One entry per configured window, in ascending window order.
    pub rolling: Vec<RollingWindow>,
}

pub type TeamSeasonKey = (String, i32);

/// Row indices per (team, season), each list ordered by date then game id.
pub fn group_by_team_season(rows: &[TeamGameRow]) -> HashMap<TeamSeasonKey, Vec<usize>> {
    let mut groups: HashMap<TeamSeasonKey, Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        groups
            .entry((row.team_id.clone(), row.season))
            .or_default()
            .push(idx);
    }
    for indices in groups.values_mut() {
        indices.sort_by(|&a, &b| {
            rows[a]
                .date
                .cmp(&rows[b].date)
                .then_with(|| rows[a].game_id.cmp(&rows[b].game_id))
        });
    }
    groups
}

/// State carried from one game to the next inside a team's season.
struct SeasonState {
    prior_wins: f64,
    prior_games: usize,
    last_date: Option<chrono::NaiveDateTime>,
    recent: VecDeque<[f64; TRACKED_STAT_COUNT]>,
}

impl SeasonState {
    fn new(capacity: usize) -> Self {
        Self {
            prior_wins: 0.0,
            prior_games: 0,
            last_date: None,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    fn rolling(&self, window: usize, epsilon: f64) -> RollingWindow {
        let mut means = [None; TRACKED_STAT_COUNT];
        let take = window.min(self.recent.len());
        if take > 0 {
            let mut sums = [0.0; TRACKED_STAT_COUNT];
            for stats in self.recent.iter().rev().take(take) {
                for (sum, v) in sums.iter_mut().zip(stats) {
                    *sum += v;
                }
            }
            for (mean, sum) in means.iter_mut().zip(sums) {
                *mean = Some(sum / take as f64);
            }
        }

        let goals = means[TrackedStat::PowerPlayGoals.index()];
        let opportunities = means[TrackedStat::PowerPlayOpportunities.index()];
        let pp_efficiency = match (goals, opportunities) {
            (Some(g), Some(o)) => Some(g / (o + epsilon)).filter(|v| v.is_finite()),
            _ => None,
        };

        RollingWindow {
            window,
            means,
            pp_efficiency,
        }
    }

    fn push(&mut self, row: &TeamGameRow, capacity: usize) {
        if row.won {
            self.prior_wins += 1.0;
        }
        self.prior_games += 1;
        self.last_date = Some(row.date);
        if self.recent.len() == capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(row.stats);
    }
}

/// Compute leakage-safe per-team features; the result is parallel to `rows`.
///
/// Each (team, season) group is scanned forward in date order. Features for a row are read
/// from the carried state before that row is folded in, so a game never sees its own result.
pub fn build_temporal_features(
    rows: &[TeamGameRow],
    cfg: &PipelineConfig,
) -> Vec<TemporalFeatures> {
    let capacity = cfg.max_window().max(1);
    let mut out: Vec<Option<TemporalFeatures>> = vec![None; rows.len()];

    for indices in group_by_team_season(rows).values() {
        let mut state = SeasonState::new(capacity);
        for &idx in indices {
            let row = &rows[idx];
            let season_win_pct = if state.prior_games == 0 {
                cfg.neutral_season_win_pct
            } else {
                Some(state.prior_wins / state.prior_games as f64)
                    .filter(|v| v.is_finite())
                    .unwrap_or(cfg.neutral_season_win_pct)
            };
            let rest_days = match state.last_date {
                Some(prev) => ((row.date - prev).num_days() as f64).min(cfg.max_rest_days),
                None => cfg.default_rest_days,
            };
            let rolling = cfg
                .rolling_windows
                .iter()
                .map(|&w| state.rolling(w, cfg.pp_efficiency_epsilon))
                .collect();

            out[idx] = Some(TemporalFeatures {
                cum_wins: state.prior_wins,
                cum_games: state.prior_games,
                season_win_pct,
                rest_days,
                rolling,
            });
            state.push(row, capacity);
        }
    }

    // Every row belongs to exactly one group, so every slot is filled.
    out.into_iter().flatten().collect()
}
