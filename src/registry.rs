use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;

use crate::identity::{RosterIndex, derive_player_id, name_variants, normalize_player_key, slugify};
use crate::model::game::GameRecord;
use crate::model::roster::TeamRoster;

/// One player in the canonical registry: roster identity plus season totals
/// and attendance metrics. `recent_*` fields are deltas against the previous
/// stats snapshot; they stay null when no previous snapshot exists.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub player_id: String,
    pub name: String,
    pub number: Option<String>,
    pub positions: Vec<String>,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub team_slug: Option<String>,
    pub games_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub points: u32,
    pub penalty_minutes: u32,
    pub points_per_game: f64,
    pub team_games_played: u32,
    pub games_missed: u32,
    pub recent_points: Option<i64>,
    pub recent_games: Option<i64>,
}

/// Build the canonical player registry.
///
/// Rosters seed the registry so every player appears even at zero games
/// played; season stat rows then overwrite totals, resolving each row to its
/// roster identity through name variants. Team games played are counted from
/// final results so per-player attendance can be derived.
pub fn build_registry(
    rosters: &BTreeMap<String, TeamRoster>,
    stats: &[BTreeMap<String, String>],
    results: &[GameRecord],
    previous_stats: Option<&[BTreeMap<String, String>]>,
) -> Vec<RegistryEntry> {
    let roster_index = RosterIndex::build(rosters.values());
    let team_games = team_games_played(results);
    let previous = previous_stats.map(PreviousStats::build);

    let mut registry: HashMap<String, RegistryEntry> = HashMap::new();

    for roster in rosters.values() {
        let team_gp = team_games.get(&roster.team_slug).copied().unwrap_or(0);
        for player in &roster.players {
            registry
                .entry(player.player_id.clone())
                .or_insert_with(|| RegistryEntry {
                    player_id: player.player_id.clone(),
                    name: player.name.clone(),
                    number: player.number.clone(),
                    positions: player.positions.clone(),
                    team_id: Some(roster.team_id.clone()),
                    team_name: Some(roster.team_name.clone()),
                    team_slug: Some(roster.team_slug.clone()),
                    games_played: 0,
                    goals: 0,
                    assists: 0,
                    points: 0,
                    penalty_minutes: 0,
                    points_per_game: 0.0,
                    team_games_played: team_gp,
                    games_missed: team_gp,
                    recent_points: None,
                    recent_games: None,
                });
        }
    }

    for row in stats {
        let team_field = field(row, &["team"]);
        let team_slug = team_field.as_deref().map(slugify).unwrap_or_default();
        let Some(name) = field(row, &["name", "player", "player_name", "playername"]) else {
            continue;
        };

        let player_id = field(row, &["player_id"])
            .or_else(|| {
                roster_index
                    .resolve(&team_slug, &name)
                    .map(|hit| hit.player_id.clone())
            })
            .unwrap_or_else(|| derive_player_id(&team_slug, &name, field(row, &["no"]).as_deref()));

        let team_gp = team_games.get(&team_slug).copied().unwrap_or(0);
        let games_played = int_stat(row, "gp");
        let goals = int_stat(row, "g");
        let assists = int_stat(row, "a");
        let points = match int_stat(row, "pts") {
            0 => goals + assists,
            explicit => explicit,
        };
        let penalty_minutes = int_stat(row, "pim");
        let stated_ppg = float_stat(row, "pts_g");

        let entry = registry
            .entry(player_id.clone())
            .or_insert_with(|| RegistryEntry {
                player_id: player_id.clone(),
                name: name.clone(),
                number: field(row, &["no", "number"]),
                positions: Vec::new(),
                team_id: None,
                team_name: team_field.clone(),
                team_slug: if team_slug.is_empty() {
                    None
                } else {
                    Some(team_slug.clone())
                },
                games_played: 0,
                goals: 0,
                assists: 0,
                points: 0,
                penalty_minutes: 0,
                points_per_game: 0.0,
                team_games_played: team_gp,
                games_missed: team_gp,
                recent_points: None,
                recent_games: None,
            });

        if entry.team_id.is_none() {
            if let Some(hit) = roster_index.resolve(&team_slug, &name) {
                entry.team_id = Some(hit.team_id.clone());
                entry.team_name = Some(hit.team_name.clone());
                entry.number = hit.number.clone();
                entry.positions = hit.positions.clone();
            }
        }

        entry.name = name.clone();
        entry.games_played = games_played;
        entry.goals = goals;
        entry.assists = assists;
        entry.points = points;
        entry.penalty_minutes = penalty_minutes;
        entry.points_per_game = if stated_ppg > 0.0 {
            stated_ppg
        } else if games_played > 0 {
            f64::from(points) / f64::from(games_played)
        } else {
            0.0
        };
        entry.team_games_played = team_gp;
        entry.games_missed = team_gp.saturating_sub(games_played);

        if let Some(previous) = &previous {
            if let Some(prev) = previous.lookup(&team_slug, &player_id, &name) {
                let prev_points = match int_stat(prev, "pts") {
                    0 => int_stat(prev, "g") + int_stat(prev, "a"),
                    explicit => explicit,
                };
                entry.recent_points = Some(i64::from(points) - i64::from(prev_points));
                entry.recent_games =
                    Some(i64::from(games_played) - i64::from(int_stat(prev, "gp")));
            }
        }
    }

    let mut entries: Vec<RegistryEntry> = registry.into_values().collect();
    entries.sort_by(|a, b| {
        (
            a.team_slug.as_deref().unwrap_or(""),
            a.number.as_deref().unwrap_or(""),
            a.name.as_str(),
        )
            .cmp(&(
                b.team_slug.as_deref().unwrap_or(""),
                b.number.as_deref().unwrap_or(""),
                b.name.as_str(),
            ))
    });
    info!(players = entries.len(), "built player registry");
    entries
}

/// Count completed games per team slug from merged results. Sides without a
/// nested slug fall back to slugifying the flat team name.
fn team_games_played(results: &[GameRecord]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for game in results {
        if !game.is_final() {
            continue;
        }
        for side in [&game.home, &game.away] {
            let slug = if side.slug.is_empty() {
                slugify(&side.name)
            } else {
                side.slug.clone()
            };
            if !slug.is_empty() {
                *counts.entry(slug).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Previous stats snapshot indexed by player identifier where present, and by
/// (team slug, normalized name) otherwise.
struct PreviousStats<'a> {
    by_id: HashMap<String, &'a BTreeMap<String, String>>,
    by_name: HashMap<(String, String), &'a BTreeMap<String, String>>,
}

impl<'a> PreviousStats<'a> {
    fn build(rows: &'a [BTreeMap<String, String>]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for row in rows {
            if let Some(pid) = field(row, &["player_id"]) {
                by_id.insert(pid, row);
                continue;
            }
            let team_slug = field(row, &["team"]).as_deref().map(slugify).unwrap_or_default();
            if let Some(name) = field(row, &["name", "player"]) {
                for variant in name_variants(&name) {
                    by_name.entry((team_slug.clone(), variant)).or_insert(row);
                }
            }
        }
        Self { by_id, by_name }
    }

    fn lookup(
        &self,
        team_slug: &str,
        player_id: &str,
        name: &str,
    ) -> Option<&'a BTreeMap<String, String>> {
        if let Some(row) = self.by_id.get(player_id) {
            return Some(row);
        }
        self.by_name
            .get(&(team_slug.to_string(), normalize_player_key(name)))
            .copied()
    }
}

fn field(row: &BTreeMap<String, String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| row.get(*name))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Lenient integer read: empty or malformed cells count as zero, and decimal
/// text is truncated.
fn int_stat(row: &BTreeMap<String, String>, key: &str) -> u32 {
    let Some(text) = field(row, &[key]) else {
        return 0;
    };
    if let Ok(value) = text.parse::<u32>() {
        return value;
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f as u32)
        .unwrap_or(0)
}

fn float_stat(row: &BTreeMap<String, String>, key: &str) -> f64 {
    field(row, &[key])
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}
