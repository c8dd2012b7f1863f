use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::game::GameRecord;

/// Win/loss record for one team over the games it appears in.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TeamForm {
    pub team: String,
    pub played: u32,
    pub wins: u32,
    pub losses: u32,
}

/// One-line headlines for completed games. Tone follows the margin: five or
/// more goals "dominates", a one-goal game "edges", anything else "defeats".
/// On a tie the home side is written first.
pub fn headlines(games: &[GameRecord]) -> Vec<String> {
    let mut lines = Vec::new();
    for game in games {
        let (Some(home_score), Some(away_score)) = (game.home.final_score, game.away.final_score)
        else {
            continue;
        };

        let margin = home_score.abs_diff(away_score);
        let tone = if margin >= 5 {
            "dominates"
        } else if margin == 1 {
            "edges"
        } else {
            "defeats"
        };

        let (winner, loser, winner_score, loser_score) = if home_score >= away_score {
            (&game.home.name, &game.away.name, home_score, away_score)
        } else {
            (&game.away.name, &game.home.name, away_score, home_score)
        };

        lines.push(format!("{} {} {} {}-{}", winner, tone, loser, winner_score, loser_score));
    }
    lines
}

/// Aggregate completed games into per-team form, best record first. Ties count
/// toward games played but neither column.
pub fn recent_team_form(games: &[GameRecord]) -> Vec<TeamForm> {
    let mut summary: BTreeMap<String, (u32, u32, u32)> = BTreeMap::new();

    for game in games {
        let (Some(home_score), Some(away_score)) = (game.home.final_score, game.away.final_score)
        else {
            continue;
        };

        let home = summary.entry(game.home.name.clone()).or_insert((0, 0, 0));
        home.0 += 1;
        if home_score > away_score {
            home.1 += 1;
        } else if away_score > home_score {
            home.2 += 1;
        }

        let away = summary.entry(game.away.name.clone()).or_insert((0, 0, 0));
        away.0 += 1;
        if away_score > home_score {
            away.1 += 1;
        } else if home_score > away_score {
            away.2 += 1;
        }
    }

    let mut form: Vec<TeamForm> = summary
        .into_iter()
        .map(|(team, (played, wins, losses))| TeamForm {
            team,
            played,
            wins,
            losses,
        })
        .collect();
    form.sort_by(|a, b| (b.wins, a.losses).cmp(&(a.wins, b.losses)));
    form
}

/// Keep only games whose start falls within the trailing window.
pub fn games_within(games: &[GameRecord], now: DateTime<Utc>, days: i64) -> Vec<GameRecord> {
    let cutoff = now - Duration::days(days);
    games
        .iter()
        .filter(|game| matches!(game.start_utc, Some(start) if start >= cutoff))
        .cloned()
        .collect()
}
