//! Weak-link Elo rating math.
//!
//! A two-player team is rated `w * min + (1 - w) * max`: the weaker partner
//! limits the team. Teams of other sizes use the mean rating.
//! Both members of a team receive the same delta, `K * (S - E)`.

use crate::config::RatingConfig;

/// Rating of a team from its members' ratings.
pub fn team_rating(ratings: &[f64], weak_link_weight: f64) -> f64 {
    match ratings {
        [] => 0.0,
        [a, b] => {
            let (low, high) = if a <= b { (*a, *b) } else { (*b, *a) };
            weak_link_weight * low + (1.0 - weak_link_weight) * high
        }
        _ => average(ratings),
    }
}

pub fn average(ratings: &[f64]) -> f64 {
    if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    }
}

/// Probability that a team rated `team` beats one rated `opponent`.
pub fn expected_score(team: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - team) / 400.0))
}

/// Rating change for a result, unrounded.
pub fn rating_change(k_factor: f64, expected: f64, won: bool) -> f64 {
    let actual = if won { 1.0 } else { 0.0 };
    k_factor * (actual - expected)
}

/// Outcome of rating one match from team A's and team B's member ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRating {
    pub team_a_rating: f64,
    pub team_b_rating: f64,
    pub team_a_expected: f64,
    /// Applied to every member of team A.
    pub team_a_delta: f64,
    /// Applied to every member of team B; always `-team_a_delta`.
    pub team_b_delta: f64,
}

pub fn rate_match(
    config: &RatingConfig,
    team_a: &[f64],
    team_b: &[f64],
    team_a_won: bool,
) -> MatchRating {
    let team_a_rating = team_rating(team_a, config.weak_link_weight);
    let team_b_rating = team_rating(team_b, config.weak_link_weight);
    let team_a_expected = expected_score(team_a_rating, team_b_rating);
    let team_a_delta = rating_change(config.k_factor, team_a_expected, team_a_won);

    MatchRating {
        team_a_rating,
        team_b_rating,
        team_a_expected,
        team_a_delta,
        team_b_delta: -team_a_delta,
    }
}

/// Next signed streak: positive counts consecutive wins, negative consecutive losses.
pub fn next_streak(current: i32, won: bool) -> i32 {
    match (won, current) {
        (true, c) if c > 0 => c.saturating_add(1),
        (true, _) => 1,
        (false, c) if c < 0 => c.saturating_sub(1),
        (false, _) => -1,
    }
}
