use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::model::stats::PlayerStatLine;

/// Lifecycle status of a game. `Final` holds iff both team lines carry a
/// non-null final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Final,
    Postponed,
    Unknown,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Final => "final",
            GameStatus::Postponed => "postponed",
            GameStatus::Unknown => "unknown",
        }
    }
}

/// One side of a game. The slug is a pure function of the name at parse time;
/// a `None` final score means "not yet played or unknown", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameTeamLine {
    pub name: String,
    pub slug: String,
    #[serde(rename = "final")]
    pub final_score: Option<u32>,
    pub periods: Vec<Option<u32>>,
    pub is_winner: Option<bool>,
}

impl GameTeamLine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: crate::identity::slugify(name),
            final_score: None,
            periods: Vec::new(),
            is_winner: None,
        }
    }

    pub fn with_score(name: &str, final_score: Option<u32>) -> Self {
        let mut line = Self::new(name);
        line.final_score = final_score;
        line
    }
}

/// Per-game player statistics, keyed by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GamePlayerStats {
    pub home: Vec<PlayerStatLine>,
    pub away: Vec<PlayerStatLine>,
}

/// Canonical representation of one real-world game, merged from the calendar
/// and scoreboard sources. Created by the calendar parser (or as a stub by the
/// reconciler) and mutated only by the reconciler as later sources merge in.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    pub game_id: String,
    pub start_utc: Option<DateTime<Utc>>,
    pub start_local: Option<DateTime<Tz>>,
    pub location: String,
    pub status: GameStatus,
    pub home: GameTeamLine,
    pub away: GameTeamLine,
    pub division: Option<String>,
    pub box_score_url: Option<String>,
    pub summary_url: Option<String>,
    pub player_stats: Option<GamePlayerStats>,
    pub scoring_summary: Vec<BTreeMap<String, String>>,
    pub penalties: Vec<BTreeMap<String, String>>,
}

impl GameRecord {
    pub fn new(game_id: String, home: GameTeamLine, away: GameTeamLine) -> Self {
        Self {
            game_id,
            start_utc: None,
            start_local: None,
            location: String::new(),
            status: GameStatus::Scheduled,
            home,
            away,
            division: None,
            box_score_url: None,
            summary_url: None,
            player_stats: None,
            scoring_summary: Vec::new(),
            penalties: Vec::new(),
        }
    }

    /// Re-derive status from the team lines: final iff both sides scored.
    pub fn recompute_status(&mut self) {
        if self.home.final_score.is_some() && self.away.final_score.is_some() {
            self.status = GameStatus::Final;
        }
    }

    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final
    }

    /// Flat per-game dictionary for simple consumers: team names and scores as
    /// plain fields, a `result` string when both scores exist, and
    /// display-friendly date/time strings.
    pub fn flat_value(&self) -> Value {
        let mut record = json!({
            "game_id": self.game_id,
            "status": self.status.as_str(),
            "location": self.location,
            "division": self.division,
            "home": self.home.name,
            "away": self.away.name,
            "home_score": score_field(self.home.final_score),
            "away_score": score_field(self.away.final_score),
            "start_utc": self.start_utc.map(|dt| dt.to_rfc3339()),
            "start_local": self.start_local.map(|dt| dt.to_rfc3339()),
            "box_score_url": self.box_score_url,
            "summary_url": self.summary_url,
            "datetime": Value::Null,
        });

        let fields = record.as_object_mut().expect("flat record is an object");
        if let (Some(home), Some(away)) = (self.home.final_score, self.away.final_score) {
            fields.insert("result".to_string(), json!(format!("{} - {}", home, away)));
        }
        if let Some(local) = self.start_local {
            fields.insert("datetime".to_string(), json!(local.naive_local().to_string()));
            fields.insert("date".to_string(), json!(local.format("%m/%d/%Y").to_string()));
            fields.insert("time".to_string(), json!(local.format("%-I:%M %p").to_string()));
        }
        record
    }

    /// Full dictionary for detailed consumers: nested team lines plus player
    /// statistics, scoring summary, and penalties. Derivable from the same
    /// record as [`flat_value`](Self::flat_value) without loss.
    pub fn full_value(&self) -> Value {
        json!({
            "game_id": self.game_id,
            "status": self.status.as_str(),
            "location": self.location,
            "division": self.division,
            "start_utc": self.start_utc.map(|dt| dt.to_rfc3339()),
            "start_local": self.start_local.map(|dt| dt.to_rfc3339()),
            "home_line": self.home,
            "away_line": self.away,
            "home": self.home.name,
            "away": self.away.name,
            "box_score_url": self.box_score_url,
            "summary_url": self.summary_url,
            "player_stats": self.player_stats,
            "scoring_summary": self.scoring_summary,
            "penalties": self.penalties,
        })
    }
}

fn score_field(score: Option<u32>) -> Value {
    match score {
        Some(score) => json!(score),
        None => json!(""),
    }
}

/// A parsed scoreboard entry, used only to feed the reconciler merge step.
/// Same essential shape as [`GameRecord`] but transient.
#[derive(Debug, Clone)]
pub struct ScoreBoardEntry {
    pub game_id: String,
    pub location: String,
    pub division: Option<String>,
    pub start_local: Option<DateTime<Tz>>,
    pub teams: Vec<GameTeamLine>,
    pub box_score_url: Option<String>,
    pub summary_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_recomputes_only_when_both_scores_present() {
        let mut game = GameRecord::new(
            "100".to_string(),
            GameTeamLine::with_score("Blue Devils", Some(5)),
            GameTeamLine::new("Ice Hawks"),
        );
        game.recompute_status();
        assert_eq!(game.status, GameStatus::Scheduled);

        game.away.final_score = Some(3);
        game.recompute_status();
        assert_eq!(game.status, GameStatus::Final);
    }

    #[test]
    fn flat_value_uses_empty_string_for_missing_scores() {
        let game = GameRecord::new(
            "100".to_string(),
            GameTeamLine::new("Blue Devils"),
            GameTeamLine::new("Ice Hawks"),
        );
        let flat = game.flat_value();
        assert_eq!(flat["home_score"], json!(""));
        assert_eq!(flat["home"], json!("Blue Devils"));
        assert!(flat.get("result").is_none());
        assert_eq!(flat["datetime"], Value::Null);
    }

    #[test]
    fn flat_and_full_shapes_agree_on_shared_fields() {
        let mut game = GameRecord::new(
            "245".to_string(),
            GameTeamLine::with_score("Blue Devils", Some(5)),
            GameTeamLine::with_score("Ice Hawks", Some(3)),
        );
        game.location = "Amherst Rink 1".to_string();
        game.recompute_status();

        let flat = game.flat_value();
        let full = game.full_value();
        assert_eq!(flat["game_id"], full["game_id"]);
        assert_eq!(flat["status"], json!("final"));
        assert_eq!(full["status"], json!("final"));
        assert_eq!(flat["result"], json!("5 - 3"));
        assert_eq!(full["home_line"]["final"], json!(5));
    }
}
