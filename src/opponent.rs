use std::collections::HashMap;

use crate::flatten::TeamGameRow;
use crate::temporal::{RollingWindow, TemporalFeatures};

/// The opponent's features, attached to a row as its `opp_*` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct OpponentMirror {
    pub team_id: String,
    pub team_name: String,
    pub won: bool,
    pub rest_days: f64,
    pub season_win_pct: f64,
    pub score: f64,
    pub shots: f64,
    pub rolling: Vec<RollingWindow>,
}

impl OpponentMirror {
    pub fn from_side(row: &TeamGameRow, temporal: &TemporalFeatures) -> Self {
        Self {
            team_id: row.team_id.clone(),
            team_name: row.team_name.clone(),
            won: row.won,
            rest_days: temporal.rest_days,
            season_win_pct: temporal.season_win_pct,
            score: row.stat(crate::stats::TrackedStat::Score),
            shots: row.stat(crate::stats::TrackedStat::Shots),
            rolling: temporal.rolling.clone(),
        }
    }
}

/// For each row, the index of the other team's row in the same game.
///
/// Rows are bucketed by game id; a row's opponent is the bucket entry with a different team
/// id. Buckets that do not hold exactly two distinct teams leave their rows unmatched.
pub fn join_opponents(rows: &[TeamGameRow]) -> Vec<Option<usize>> {
    let mut by_game: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        by_game.entry(row.game_id.as_str()).or_default().push(idx);
    }

    let mut out = vec![None; rows.len()];
    for (game_id, indices) in &by_game {
        let [a, b] = indices.as_slice() else {
            tracing::warn!(game_id, rows = indices.len(), "game id does not map to two rows");
            continue;
        };
        if rows[*a].team_id == rows[*b].team_id {
            tracing::warn!(game_id, "both rows of game carry the same team id");
            continue;
        }
        out[*a] = Some(*b);
        out[*b] = Some(*a);
    }
    out
}
