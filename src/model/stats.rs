use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One resolved per-game stat line, attached to a game's `player_stats`.
/// Never exists without a parent game record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatLine {
    pub player_id: String,
    pub name: String,
    pub number: Option<String>,
    pub positions: Vec<String>,
    pub goals: u32,
    pub assists: u32,
    pub points: u32,
    pub penalty_minutes: u32,
}

/// A raw per-player row from a box-score table, before identity resolution.
/// Numeric fields are `None` when the cell was absent or non-numeric; the
/// reconciler normalizes absent to 0 for arithmetic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlayerRow {
    pub number: Option<String>,
    pub name: String,
    pub positions: String,
    pub goals: Option<u32>,
    pub assists: Option<u32>,
    pub points: Option<u32>,
    pub penalty_minutes: Option<u32>,
}

/// One per-team player table from a box-score page. Team identity is carried
/// by page position plus whatever name the scoreboard table listed; the
/// reconciler, not the parser, assigns it to a game side.
#[derive(Debug, Clone, Default)]
pub struct PlayerTable {
    pub team_name: Option<String>,
    pub rows: Vec<RawPlayerRow>,
}

/// Everything extracted from a box-score page.
#[derive(Debug, Clone, Default)]
pub struct BoxScore {
    /// Team names from the header scoreboard table, in page order.
    pub team_order: Vec<String>,
    pub scoring_summary: Vec<BTreeMap<String, String>>,
    pub penalties: Vec<BTreeMap<String, String>>,
    pub player_tables: Vec<PlayerTable>,
}
