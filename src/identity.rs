use std::collections::HashMap;

use tracing::{info, warn};

use crate::model::roster::TeamRoster;

/// Normalize a display name into a URL/identifier-safe slug: lower-cased,
/// alphanumeric runs joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-, punctuation-, and whitespace-insensitive matching key for a player
/// name. Word order is preserved; ordering insensitivity comes from
/// [`name_variants`] generating both renderings.
pub fn normalize_player_key(name: &str) -> String {
    let stripped: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_ws(&stripped).to_lowercase()
}

/// All normalized renderings of a name used for roster matching. Both
/// "Last, First" and "First Last" orderings are generated regardless of which
/// form the source used.
pub fn name_variants(name: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(2);
    let base = normalize_player_key(name);
    if base.is_empty() {
        return variants;
    }

    let flipped = match name.split_once(',') {
        // "Marshall, Sam" -> "sam marshall"
        Some((last, first)) => normalize_player_key(&format!("{} {}", first, last)),
        // "Sam Marshall" -> "marshall sam"
        None => match base.rsplit_once(' ') {
            Some((rest, last)) => format!("{} {}", last, rest),
            None => base.clone(),
        },
    };

    variants.push(base);
    if !variants.contains(&flipped) {
        variants.push(flipped);
    }
    variants
}

/// Synthesize a stable player identifier from (team slug, name, optional
/// jersey number). Deterministic for the life of a name+number combination;
/// used uniformly by roster parsing and unmatched stat-row resolution.
pub fn derive_player_id(team_slug: &str, name: &str, number: Option<&str>) -> String {
    let mut id = format!("{}-{}", team_slug, slugify(name));
    if let Some(number) = number {
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        if !digits.is_empty() {
            id.push('-');
            id.push_str(&digits);
        }
    }
    id
}

/// One roster player as seen through the lookup table.
#[derive(Debug, Clone)]
pub struct RosterHit {
    pub player_id: String,
    pub name: String,
    pub number: Option<String>,
    pub positions: Vec<String>,
    pub team_id: String,
    pub team_name: String,
}

/// Lookup table from (team slug, normalized name variant) to roster players,
/// rebuilt once per roster fetch.
#[derive(Debug, Default)]
pub struct RosterIndex {
    entries: HashMap<(String, String), RosterHit>,
}

impl RosterIndex {
    /// Index every roster player under each of its name variants. Two distinct
    /// players normalizing to the same key within one team is a roster data
    /// inconsistency; the first one indexed wins and the collision is logged.
    pub fn build<'a>(rosters: impl IntoIterator<Item = &'a TeamRoster>) -> Self {
        let mut entries: HashMap<(String, String), RosterHit> = HashMap::new();
        for roster in rosters {
            for player in &roster.players {
                let hit = RosterHit {
                    player_id: player.player_id.clone(),
                    name: player.name.clone(),
                    number: player.number.clone(),
                    positions: player.positions.clone(),
                    team_id: roster.team_id.clone(),
                    team_name: roster.team_name.clone(),
                };
                for variant in name_variants(&player.name) {
                    let key = (roster.team_slug.clone(), variant);
                    if let Some(existing) = entries.get(&key) {
                        if existing.player_id != hit.player_id {
                            warn!(
                                team = %roster.team_slug,
                                variant = %key.1,
                                kept = %existing.player_id,
                                dropped = %hit.player_id,
                                "roster name collision, keeping first entry"
                            );
                        }
                        continue;
                    }
                    entries.insert(key, hit.clone());
                }
            }
        }
        info!(variants = entries.len(), "built roster lookup");
        Self { entries }
    }

    /// Best-matching roster player for a free-text name on a team, or none.
    pub fn resolve(&self, team_slug: &str, name: &str) -> Option<&RosterHit> {
        for variant in name_variants(name) {
            if let Some(hit) = self.entries.get(&(team_slug.to_string(), variant)) {
                return Some(hit);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
