use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::game_record::{coerce_f64, coerce_id, coerce_string, optional_f64};
use crate::stats::{TRACKED_STAT_COUNT, TrackedStat};

/// Season rollover: games after August belong to the season ending next calendar year.
const SEASON_ROLLOVER_MONTH: u32 = 8;

/// One team's side of one game: shared game context plus that team's own box score.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamGameRow {
    pub game_id: String,
    pub date: NaiveDateTime,
    pub season: i32,
    pub venue: String,
    pub attendance: f64,
    pub officials: String,
    pub season_series: String,
    pub spread: Option<f64>,
    pub over_under: f64,
    pub favorite_moneyline: f64,
    pub team_id: String,
    pub team_name: String,
    pub home_away: String,
    pub team_record: String,
    pub won: bool,
    /// Indexed by [`TrackedStat::index`].
    pub stats: [f64; TRACKED_STAT_COUNT],
}

impl TeamGameRow {
    pub fn stat(&self, stat: TrackedStat) -> f64 {
        stat.value(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingGameId,
    MissingDate,
    UnparseableDate,
    TeamCount(usize),
    DuplicateTeam,
    DuplicateGame,
}

impl SkipReason {
    pub fn kind(self) -> &'static str {
        match self {
            SkipReason::NotAnObject => "not_an_object",
            SkipReason::MissingGameId => "missing_game_id",
            SkipReason::MissingDate => "missing_date",
            SkipReason::UnparseableDate => "unparseable_date",
            SkipReason::TeamCount(_) => "team_count",
            SkipReason::DuplicateTeam => "duplicate_team",
            SkipReason::DuplicateGame => "duplicate_game",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "record is not a json object"),
            SkipReason::MissingGameId => write!(f, "record has no game id"),
            SkipReason::MissingDate => write!(f, "record has no date"),
            SkipReason::UnparseableDate => write!(f, "record date is not a calendar date"),
            SkipReason::TeamCount(n) => write!(f, "expected 2 team stat entries, found {n}"),
            SkipReason::DuplicateTeam => write!(f, "both team stat entries share a team id"),
            SkipReason::DuplicateGame => write!(f, "game id already seen earlier in the batch"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlattenOutcome {
    Rows(Box<[TeamGameRow; 2]>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default)]
pub struct FlattenSummary {
    pub records_seen: usize,
    pub games_kept: usize,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl FlattenSummary {
    pub fn records_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

pub fn season_for_date(date: NaiveDate) -> i32 {
    if date.month() > SEASON_ROLLOVER_MONTH {
        date.year() + 1
    } else {
        date.year()
    }
}

/// Accepts plain dates, RFC 3339 timestamps (kept at their local wall-clock time) and naive
/// timestamps.
pub fn parse_game_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

pub fn flatten_game(game: &Value) -> FlattenOutcome {
    match try_flatten(game) {
        Ok(rows) => FlattenOutcome::Rows(Box::new(rows)),
        Err(reason) => FlattenOutcome::Skipped(reason),
    }
}

fn try_flatten(game: &Value) -> Result<[TeamGameRow; 2], SkipReason> {
    let obj = game.as_object().ok_or(SkipReason::NotAnObject)?;
    let game_id = coerce_id(obj.get("game_id")).ok_or(SkipReason::MissingGameId)?;

    let raw_date = obj
        .get("date")
        .and_then(|v| v.as_str())
        .ok_or(SkipReason::MissingDate)?;
    let date = parse_game_date(raw_date).ok_or(SkipReason::UnparseableDate)?;
    let season = season_for_date(date.date());

    let teams = obj
        .get("teams_stats")
        .and_then(|v| v.as_array())
        .map(|arr| arr.as_slice())
        .unwrap_or_default();
    let [first, second] = teams else {
        return Err(SkipReason::TeamCount(teams.len()));
    };

    let context = GameContext {
        game_id,
        date,
        season,
        venue: coerce_string(obj.get("venue")).unwrap_or_else(|| "Unknown".to_string()),
        attendance: coerce_f64(obj.get("attendance")),
        officials: officials_label(obj.get("officials")),
        season_series: coerce_string(obj.get("season_series_summary")).unwrap_or_default(),
        spread: optional_f64(obj.get("spread")),
        over_under: coerce_f64(obj.get("over_under")),
        favorite_moneyline: coerce_f64(obj.get("favorite_moneyline")),
    };

    let a = team_side(first);
    let b = team_side(second);
    if a.team_id == b.team_id {
        return Err(SkipReason::DuplicateTeam);
    }

    let a_score = a.stats[TrackedStat::Score.index()];
    let b_score = b.stats[TrackedStat::Score.index()];
    Ok([
        context.row(a, a_score > b_score),
        context.row(b, b_score > a_score),
    ])
}

struct GameContext {
    game_id: String,
    date: NaiveDateTime,
    season: i32,
    venue: String,
    attendance: f64,
    officials: String,
    season_series: String,
    spread: Option<f64>,
    over_under: f64,
    favorite_moneyline: f64,
}

impl GameContext {
    fn row(&self, side: TeamSide, won: bool) -> TeamGameRow {
        TeamGameRow {
            game_id: self.game_id.clone(),
            date: self.date,
            season: self.season,
            venue: self.venue.clone(),
            attendance: self.attendance,
            officials: self.officials.clone(),
            season_series: self.season_series.clone(),
            spread: self.spread,
            over_under: self.over_under,
            favorite_moneyline: self.favorite_moneyline,
            team_id: side.team_id,
            team_name: side.team_name,
            home_away: side.home_away,
            team_record: side.team_record,
            won,
            stats: side.stats,
        }
    }
}

struct TeamSide {
    team_id: String,
    team_name: String,
    home_away: String,
    team_record: String,
    stats: [f64; TRACKED_STAT_COUNT],
}

fn team_side(v: &Value) -> TeamSide {
    let mut stats = [0.0; TRACKED_STAT_COUNT];
    for stat in TrackedStat::ALL {
        stats[stat.index()] = coerce_f64(v.get(stat.column()));
    }
    TeamSide {
        team_id: coerce_id(v.get("team_id")).unwrap_or_default(),
        team_name: coerce_string(v.get("team_name")).unwrap_or_default(),
        home_away: coerce_string(v.get("home_away")).unwrap_or_default(),
        team_record: coerce_string(v.get("record_summary")).unwrap_or_default(),
        stats,
    }
}

fn officials_label(v: Option<&Value>) -> String {
    let Some(crew) = v.and_then(|v| v.as_array()) else {
        return String::new();
    };
    crew.iter()
        .map(|o| o.get("name").and_then(|n| n.as_str()).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("|")
}

/// Flatten a whole batch. Later records reusing a game id are dropped so every game id
/// maps to exactly two rows.
pub fn flatten_games(records: &[Value]) -> (Vec<TeamGameRow>, FlattenSummary) {
    let mut rows = Vec::with_capacity(records.len() * 2);
    let mut summary = FlattenSummary {
        records_seen: records.len(),
        ..FlattenSummary::default()
    };
    let mut seen_games = HashSet::new();

    for (idx, record) in records.iter().enumerate() {
        let outcome = match flatten_game(record) {
            FlattenOutcome::Rows(pair) if !seen_games.insert(pair[0].game_id.clone()) => {
                FlattenOutcome::Skipped(SkipReason::DuplicateGame)
            }
            other => other,
        };
        match outcome {
            FlattenOutcome::Rows(pair) => {
                let [a, b] = *pair;
                rows.push(a);
                rows.push(b);
                summary.games_kept += 1;
            }
            FlattenOutcome::Skipped(reason) => {
                tracing::debug!(record = idx, %reason, "skipping game record");
                *summary.skipped.entry(reason.kind()).or_insert(0) += 1;
            }
        }
    }

    (rows, summary)
}
