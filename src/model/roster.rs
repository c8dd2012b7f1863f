use serde::{Deserialize, Serialize};

/// A player on a roster. The identifier is derived once at parse time from
/// (team slug, normalized name, jersey number) and does not change across
/// re-parses unless the underlying name or number text changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub number: Option<String>,
    pub name: String,
    pub positions: Vec<String>,
    pub player_id: String,
    pub captaincy: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub shoots: Option<String>,
    pub catches: Option<String>,
    pub hometown: Option<String>,
}

/// One team's roster. Rebuilt wholesale on each roster fetch, never mutated
/// incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub team_id: String,
    pub team_name: String,
    pub team_slug: String,
    pub players: Vec<RosterPlayer>,
}
