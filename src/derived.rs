/// Share of opponent shots that did not score. Falls back to `neutral` without shots.
pub fn save_pct(opp_shots: f64, opp_score: f64, neutral: f64) -> f64 {
    if opp_shots > 0.0 {
        (opp_shots - opp_score) / opp_shots
    } else {
        neutral
    }
}

pub fn is_home(home_away: &str) -> bool {
    home_away == "home"
}

pub fn rest_advantage(own_rest_days: f64, opp_rest_days: f64) -> f64 {
    own_rest_days - opp_rest_days
}
