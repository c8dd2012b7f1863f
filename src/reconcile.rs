use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use crate::identity::{RosterIndex, derive_player_id, slugify};
use crate::model::game::{GamePlayerStats, GameRecord, GameStatus, ScoreBoardEntry};
use crate::model::stats::{BoxScore, PlayerStatLine, PlayerTable, RawPlayerRow};

/// Merge scoreboard entries into calendar-derived games, producing one
/// canonical record per real-world event.
///
/// The merge is keyed on the game identifier. A calendar identifier, once
/// assigned, is never reassigned; scoreboard entries without a calendar
/// counterpart become stub records under their own identifier. Games that
/// disappeared from a feed are left unmatched, never retracted. Records passed
/// in are mutated by the merge and must not be assumed unchanged by callers.
pub fn merge_games(games: Vec<GameRecord>, scores: Vec<ScoreBoardEntry>) -> Vec<GameRecord> {
    let mut merged = games;
    let mut by_id: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(idx, game)| (game.game_id.clone(), idx))
        .collect();

    let mut stubs = 0usize;
    for entry in scores {
        if let Some(&idx) = by_id.get(&entry.game_id) {
            merge_entry(&mut merged[idx], &entry);
            continue;
        }

        // A game may be visible in scores before it appears in the calendar,
        // or never appear there at all.
        if entry.teams.len() == 2 {
            let stub = stub_from_entry(entry);
            by_id.insert(stub.game_id.clone(), merged.len());
            merged.push(stub);
            stubs += 1;
        } else {
            warn!(
                game_id = %entry.game_id,
                teams = entry.teams.len(),
                "ignoring scoreboard entry without two team lines"
            );
        }
    }

    info!(games = merged.len(), stubs, "merged calendar and scoreboard feeds");
    merged
}

/// Non-destructive merge of one scoreboard entry into an existing game: the
/// scoreboard fills fields the calendar left absent (division, links,
/// location), supplies the start time when missing, and is always
/// authoritative for scores. Idempotent for a given entry.
fn merge_entry(game: &mut GameRecord, entry: &ScoreBoardEntry) {
    if game.division.is_none() {
        game.division = entry.division.clone();
    }
    if game.box_score_url.is_none() {
        game.box_score_url = entry.box_score_url.clone();
    }
    if game.summary_url.is_none() {
        game.summary_url = entry.summary_url.clone();
    }
    if game.location.is_empty() && !entry.location.is_empty() {
        game.location = entry.location.clone();
    }
    if game.start_local.is_none() {
        if let Some(start_local) = entry.start_local {
            game.start_local = Some(start_local);
            if game.start_utc.is_none() {
                game.start_utc = Some(start_local.with_timezone(&Utc));
            }
        }
    }

    // Team lines align by slug, not position: narrative order in the scores
    // feed is not guaranteed to match calendar-listed order.
    for side in [&mut game.home, &mut game.away] {
        if let Some(score_line) = entry.teams.iter().find(|team| team.slug == side.slug) {
            side.final_score = score_line.final_score;
            side.periods = score_line.periods.clone();
            side.is_winner = score_line.is_winner;
        }
    }

    game.recompute_status();
}

fn stub_from_entry(entry: ScoreBoardEntry) -> GameRecord {
    let mut teams = entry.teams.into_iter();
    let home = teams.next().expect("checked two team lines");
    let away = teams.next().expect("checked two team lines");

    let status = if home.final_score.is_some() && away.final_score.is_some() {
        GameStatus::Final
    } else {
        GameStatus::Unknown
    };

    let mut game = GameRecord::new(entry.game_id, home, away);
    game.start_local = entry.start_local;
    game.start_utc = entry.start_local.map(|dt| dt.with_timezone(&Utc));
    game.location = entry.location;
    game.status = status;
    game.division = entry.division;
    game.box_score_url = entry.box_score_url;
    game.summary_url = entry.summary_url;
    game
}

/// Attach a parsed box score to a completed game: align each per-team player
/// table to a side and resolve every stat row to a stable player identifier.
///
/// Tables whose associated team name slug-matches a side claim that side;
/// the rest are assigned in a fixed fallback order, home then away. Rows with
/// no roster match get a synthesized identifier scoped to (team slug,
/// normalized name, number) so every record stays machine-addressable.
pub fn attach_box_score(game: &mut GameRecord, box_score: &BoxScore, roster: &RosterIndex) {
    game.scoring_summary = box_score.scoring_summary.clone();
    game.penalties = box_score.penalties.clone();

    let mut stats = GamePlayerStats::default();
    let mut home_taken = false;
    let mut away_taken = false;
    let mut unassigned: Vec<&PlayerTable> = Vec::new();

    for table in &box_score.player_tables {
        let slug = table.team_name.as_deref().map(slugify);
        match slug {
            Some(slug) if slug == game.home.slug && !home_taken => {
                stats.home = resolve_rows(&table.rows, &game.home.slug, roster);
                home_taken = true;
            }
            Some(slug) if slug == game.away.slug && !away_taken => {
                stats.away = resolve_rows(&table.rows, &game.away.slug, roster);
                away_taken = true;
            }
            _ => unassigned.push(table),
        }
    }

    for table in unassigned {
        if !home_taken {
            stats.home = resolve_rows(&table.rows, &game.home.slug, roster);
            home_taken = true;
        } else if !away_taken {
            stats.away = resolve_rows(&table.rows, &game.away.slug, roster);
            away_taken = true;
        } else {
            warn!(game_id = %game.game_id, "extra player table ignored");
        }
    }

    game.player_stats = Some(stats);
}

fn resolve_rows(rows: &[RawPlayerRow], team_slug: &str, roster: &RosterIndex) -> Vec<PlayerStatLine> {
    rows.iter().map(|row| resolve_row(row, team_slug, roster)).collect()
}

fn resolve_row(row: &RawPlayerRow, team_slug: &str, roster: &RosterIndex) -> PlayerStatLine {
    let goals = row.goals.unwrap_or(0);
    let assists = row.assists.unwrap_or(0);
    let computed = goals + assists;
    let points = match row.points {
        Some(explicit) if explicit != computed => {
            // The explicit total still wins, but the disagreement is surfaced.
            warn!(
                player = %row.name,
                explicit,
                computed,
                "stated point total disagrees with goals+assists"
            );
            explicit
        }
        Some(explicit) => explicit,
        None => computed,
    };

    let mut positions = crate::roster::split_positions(Some(&row.positions));

    match roster.resolve(team_slug, &row.name) {
        Some(hit) => {
            if positions.is_empty() {
                positions = hit.positions.clone();
            }
            PlayerStatLine {
                player_id: hit.player_id.clone(),
                name: row.name.clone(),
                number: row.number.clone().or_else(|| hit.number.clone()),
                positions,
                goals,
                assists,
                points,
                penalty_minutes: row.penalty_minutes.unwrap_or(0),
            }
        }
        None => PlayerStatLine {
            player_id: derive_player_id(team_slug, &row.name, row.number.as_deref()),
            name: row.name.clone(),
            number: row.number.clone(),
            positions,
            goals,
            assists,
            points,
            penalty_minutes: row.penalty_minutes.unwrap_or(0),
        },
    }
}
