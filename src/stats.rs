use crate::flatten::TeamGameRow;

pub const TRACKED_STAT_COUNT: usize = 10;

/// Per-game team statistics that get clipped and rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedStat {
    Score,
    PowerPlayGoals,
    PowerPlayOpportunities,
    FaceoffWinPct,
    Hits,
    BlockedShots,
    Shots,
    PenaltyMinutes,
    Giveaways,
    Takeaways,
}

impl TrackedStat {
    pub const ALL: [TrackedStat; TRACKED_STAT_COUNT] = [
        TrackedStat::Score,
        TrackedStat::PowerPlayGoals,
        TrackedStat::PowerPlayOpportunities,
        TrackedStat::FaceoffWinPct,
        TrackedStat::Hits,
        TrackedStat::BlockedShots,
        TrackedStat::Shots,
        TrackedStat::PenaltyMinutes,
        TrackedStat::Giveaways,
        TrackedStat::Takeaways,
    ];

    pub fn column(self) -> &'static str {
        match self {
            TrackedStat::Score => "score",
            TrackedStat::PowerPlayGoals => "power_play_goals",
            TrackedStat::PowerPlayOpportunities => "power_play_opportunities",
            TrackedStat::FaceoffWinPct => "faceoff_win_pct",
            TrackedStat::Hits => "hits",
            TrackedStat::BlockedShots => "blocked_shots",
            TrackedStat::Shots => "shots",
            TrackedStat::PenaltyMinutes => "pim",
            TrackedStat::Giveaways => "giveaways",
            TrackedStat::Takeaways => "takeaways",
        }
    }

    /// Position inside [`TrackedStat::ALL`] and inside every per-stat array.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn value(self, row: &TeamGameRow) -> f64 {
        row.stats[self.index()]
    }

    pub fn value_mut(self, row: &mut TeamGameRow) -> &mut f64 {
        &mut row.stats[self.index()]
    }
}
