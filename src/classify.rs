use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::info;

use crate::calendar::contains_ascii_ci;
use crate::corrections::NameCorrections;
use crate::identity::normalize_player_key;

/// Accepted ISO-like datetime layouts for explicit datetime fields.
const ISO_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
/// Accepted layouts for a header date combined with a time string.
const DATE_TIME_FORMATS: [&str; 4] = [
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %I %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I %p",
];
/// Shorter list for a header date alone.
const DATE_FORMATS: [&str; 3] = ["%b %d, %Y", "%m/%d/%Y", "%Y-%m-%d"];

/// Classifier options, passed in explicitly so tests can substitute their own
/// venue filter and correction table.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    pub venue_filter: String,
    pub limit: usize,
    pub time_zone: Tz,
    pub corrections: NameCorrections,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            venue_filter: "Amherst".to_string(),
            limit: 10,
            time_zone: chrono_tz::America::Halifax,
            corrections: NameCorrections::league_defaults(),
        }
    }
}

/// Bounded display lists: recently completed games (newest first) and
/// upcoming games (soonest first). A game never appears in both.
#[derive(Debug, Default)]
pub struct DisplayLists {
    pub recent: Vec<Value>,
    pub upcoming: Vec<Value>,
}

struct Candidate {
    value: Value,
    played: bool,
    /// Played was decided from score evidence, not from the clock.
    finalized: bool,
    timestamp: Option<DateTime<Utc>>,
    key: String,
    triple: (String, String, String),
}

/// Classify a pool of game dictionaries assembled from possibly-overlapping
/// schedule and results exports into deduplicated recent/upcoming lists.
///
/// Exports disagree on shape: some carry nested team-line objects, some flat
/// string fields. Every entry is normalized to the flat shape up front so the
/// decision logic never branches on shape. `now` is an explicit argument to
/// keep the played/upcoming split deterministic under test.
pub fn classify_games(pool: Vec<Value>, now: DateTime<Utc>, config: &ClassifyConfig) -> DisplayLists {
    let mut completed: Vec<Candidate> = Vec::new();
    let mut upcoming: Vec<Candidate> = Vec::new();

    for game in pool {
        let Some(candidate) = normalize_game(game, now, config) else {
            continue;
        };
        if candidate.played {
            completed.push(candidate);
        } else {
            upcoming.push(candidate);
        }
    }

    // Newest first; unresolved timestamps sort last on both lists. On equal
    // instants a score-backed record beats a clock-inferred one, so the scored
    // shape of a duplicated game claims the recent slot.
    completed.sort_by(|a, b| {
        let order = match (a.timestamp, b.timestamp) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        order.then(b.finalized.cmp(&a.finalized))
    });
    upcoming.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut lists = DisplayLists::default();
    let mut recent_keys: HashSet<String> = HashSet::new();
    let mut recent_triples: HashSet<(String, String, String)> = HashSet::new();

    for candidate in completed {
        if lists.recent.len() >= config.limit {
            break;
        }
        if recent_keys.insert(candidate.key.clone()) {
            recent_triples.insert(candidate.triple.clone());
            lists.recent.push(candidate.value);
        }
    }

    // The recent list is final at this point; an upcoming candidate sharing an
    // identifier or the (home, away, datetime) triple with it is the same
    // real-world game seen through the other export.
    let mut upcoming_keys: HashSet<String> = HashSet::new();
    for candidate in upcoming {
        if lists.upcoming.len() >= config.limit {
            break;
        }
        if recent_keys.contains(&candidate.key) || recent_triples.contains(&candidate.triple) {
            continue;
        }
        if upcoming_keys.insert(candidate.key.clone()) {
            lists.upcoming.push(candidate.value);
        }
    }

    info!(
        recent = lists.recent.len(),
        upcoming = lists.upcoming.len(),
        "classified display lists"
    );
    lists
}

/// Flatten, correct, filter, and pre-compute everything the classifier needs
/// from one game dictionary. Returns `None` for non-objects and games outside
/// the venue of interest.
fn normalize_game(mut game: Value, now: DateTime<Utc>, config: &ClassifyConfig) -> Option<Candidate> {
    if !game.is_object() {
        return None;
    }
    let nested_final = flatten_team_lines(&mut game);
    apply_corrections(&mut game, &config.corrections);

    let fields = game.as_object()?;
    let location = string_field(fields, "location")
        .or_else(|| string_field(fields, "Location"))
        .unwrap_or_default();
    if !contains_ascii_ci(&location, &config.venue_filter) {
        return None;
    }

    let home_score = int_field(fields, "home_score");
    let away_score = int_field(fields, "away_score");

    let timestamp = resolve_timestamp(fields, config.time_zone);

    // Played/finished determination, in priority order.
    let finalized = home_score.is_some() && away_score.is_some()
        || string_field(fields, "result")
            .as_deref()
            .and_then(parse_result_text)
            .is_some()
        || nested_final;
    let played = finalized || matches!(timestamp, Some(ts) if ts < now);

    let home_key = normalize_player_key(&string_field(fields, "home").unwrap_or_default());
    let away_key = normalize_player_key(&string_field(fields, "away").unwrap_or_default());
    let datetime_field = ["datetime", "start_local", "start_utc", "date"]
        .iter()
        .find_map(|key| string_field(fields, key))
        .unwrap_or_default();
    let triple = (home_key.clone(), away_key.clone(), datetime_field.clone());

    let key = match explicit_id(fields) {
        Some(id) => format!("id:{}", id),
        None => format!(
            "fb:{}|{}|{}|{}|{}",
            home_key,
            away_key,
            datetime_field,
            home_score.map(|s| s.to_string()).unwrap_or_default(),
            away_score.map(|s| s.to_string()).unwrap_or_default(),
        ),
    };

    Some(Candidate {
        value: game,
        played,
        finalized,
        timestamp,
        key,
        triple,
    })
}

/// Flatten nested team-line objects (either `home`/`away` themselves or
/// `home_line`/`away_line` companions) into flat string and score fields,
/// preserving flat fields that already exist. Returns whether any nested line
/// carried a non-null final value.
fn flatten_team_lines(game: &mut Value) -> bool {
    let Some(fields) = game.as_object_mut() else {
        return false;
    };

    let mut nested_final = false;
    for side in ["home", "away"] {
        let line_key = format!("{}_line", side);
        let nested = match fields.get(side) {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => match fields.get(&line_key) {
                Some(Value::Object(map)) => Some(map.clone()),
                _ => None,
            },
        };
        let Some(nested) = nested else {
            continue;
        };

        if let Some(final_value) = nested.get("final") {
            if !final_value.is_null() {
                nested_final = true;
                let score_key = format!("{}_score", side);
                if int_field(fields, &score_key).is_none() {
                    fields.insert(score_key, final_value.clone());
                }
            }
        }
        if let Some(periods) = nested.get("periods") {
            let periods_key = format!("{}_periods", side);
            if !fields.contains_key(&periods_key) {
                fields.insert(periods_key, periods.clone());
            }
        }
        let name = nested
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match fields.get(side) {
            Some(Value::String(existing)) if !existing.is_empty() => {}
            _ => {
                fields.insert(side.to_string(), Value::String(name));
            }
        }
    }
    nested_final
}

fn apply_corrections(game: &mut Value, corrections: &NameCorrections) {
    if corrections.is_empty() {
        return;
    }
    let Some(fields) = game.as_object_mut() else {
        return;
    };
    for key in ["home", "away", "name", "player_name"] {
        if let Some(Value::String(text)) = fields.get(key) {
            let corrected = corrections.apply(text);
            fields.insert(key.to_string(), Value::String(corrected));
        }
    }
}

/// Resolve the best-available instant for a game, in priority order: explicit
/// ISO-like datetime fields, then header date + time, then date alone.
fn resolve_timestamp(
    fields: &serde_json::Map<String, Value>,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    for key in ["datetime", "start_local", "start_utc"] {
        if let Some(text) = string_field(fields, key) {
            if let Some(ts) = parse_iso_like(&text, tz) {
                return Some(ts);
            }
        }
    }

    let date_text = string_field(fields, "date")?;
    if let Some(time_text) = string_field(fields, "time") {
        let candidate = format!("{} {}", date_text, time_text);
        for format in DATE_TIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, format) {
                return local_to_utc(naive, tz);
            }
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&date_text, format) {
            return local_to_utc(date.and_hms_opt(0, 0, 0)?, tz);
        }
    }
    None
}

fn parse_iso_like(text: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ISO_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return local_to_utc(naive, tz);
        }
    }
    None
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        chrono::LocalResult::None => None,
    }
}

/// A textual result field counts as played when it contains exactly two
/// numbers joined by a separator, e.g. `"5 - 3"`.
fn parse_result_text(text: &str) -> Option<(i64, i64)> {
    let numbers: Vec<i64> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect();
    match numbers.as_slice() {
        [home, away] => Some((*home, *away)),
        _ => None,
    }
}

fn explicit_id(fields: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["game_id", "gameID", "id"] {
        match fields.get(key) {
            Some(Value::String(id)) if !id.trim().is_empty() => return Some(id.trim().to_string()),
            Some(Value::Number(id)) => return Some(id.to_string()),
            _ => {}
        }
    }
    None
}

fn string_field(fields: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn int_field(fields: &serde_json::Map<String, Value>, key: &str) -> Option<i64> {
    match fields.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_text_needs_exactly_two_numbers() {
        assert_eq!(parse_result_text("5 - 3"), Some((5, 3)));
        assert_eq!(parse_result_text("5-3"), Some((5, 3)));
        assert_eq!(parse_result_text("W 5-3 OT 1"), None);
        assert_eq!(parse_result_text("postponed"), None);
    }

    #[test]
    fn nested_lines_flatten_without_clobbering_flat_fields() {
        let mut game = json!({
            "home": {"name": "Blue Devils", "final": 5, "periods": [1, 2, 2]},
            "away": {"name": "Ice Hawks", "final": 3},
            "location": "Amherst Rink 1",
        });
        let nested_final = flatten_team_lines(&mut game);
        assert!(nested_final);
        assert_eq!(game["home"], json!("Blue Devils"));
        assert_eq!(game["home_score"], json!(5));
        assert_eq!(game["home_periods"], json!([1, 2, 2]));
        assert_eq!(game["away_score"], json!(3));

        let mut flat = json!({"home": "Blue Devils", "away": "Ice Hawks"});
        assert!(!flatten_team_lines(&mut flat));
        assert_eq!(flat["home"], json!("Blue Devils"));
    }

    #[test]
    fn explicit_id_wins_over_composite() {
        let game = json!({"game_id": "245", "home": "A", "away": "B"});
        assert_eq!(
            explicit_id(game.as_object().expect("object")),
            Some("245".to_string())
        );
    }

    #[test]
    fn timestamp_resolution_prefers_explicit_datetime() {
        let tz = chrono_tz::America::Halifax;
        let fields = json!({
            "datetime": "2025-11-04T21:00:00",
            "date": "Nov 1, 2025",
            "time": "7:00 PM",
        });
        let ts = resolve_timestamp(fields.as_object().expect("object"), tz).expect("resolved");
        assert_eq!(ts.to_rfc3339(), "2025-11-05T01:00:00+00:00");

        let date_only = json!({"date": "Nov 1, 2025"});
        let ts = resolve_timestamp(date_only.as_object().expect("object"), tz).expect("resolved");
        assert_eq!(ts.to_rfc3339(), "2025-11-01T03:00:00+00:00");

        let unresolved = json!({"date": "next week"});
        assert!(resolve_timestamp(unresolved.as_object().expect("object"), tz).is_none());
    }
}
