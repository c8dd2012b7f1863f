use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{CalendarComponent, Component};
use tracing::{error, info, warn};

use crate::identity::collapse_ws;
use crate::model::game::{GameRecord, GameStatus, GameTeamLine};

/// Identifier used when an event carries no usable game id. Callers must
/// treat it as non-unique.
pub const UNKNOWN_GAME_ID: &str = "unknown";

/// Calendar parsing options. Both values are explicit configuration rather
/// than module constants so tests can substitute their own.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Case-insensitive venue substring; events elsewhere are dropped before
    /// any further processing. `None` keeps every event.
    pub venue_filter: Option<String>,
    /// Named league time zone used to compute the missing instant from
    /// whichever of UTC/local the feed supplied.
    pub time_zone: Tz,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            venue_filter: Some("Amherst".to_string()),
            time_zone: chrono_tz::America::Halifax,
        }
    }
}

/// Parse a line-folded ICS calendar into game records.
///
/// Events missing a summary are discarded. An undecodable calendar aborts
/// this source only: the result is an empty list, never a panic.
pub fn parse_calendar(ics: &str, config: &CalendarConfig) -> Vec<GameRecord> {
    let unfolded = icalendar::parser::unfold(ics);
    let calendar: icalendar::Calendar = match icalendar::parser::read_calendar(&unfolded) {
        Ok(parsed) => parsed.into(),
        Err(e) => {
            error!(error = %e, "calendar parse failed, contributing no events");
            return Vec::new();
        }
    };

    let mut games: Vec<GameRecord> = Vec::new();
    for component in &calendar.components {
        let CalendarComponent::Event(event) = component else {
            continue;
        };

        let location = collapse_ws(event.property_value("LOCATION").unwrap_or(""));
        if let Some(filter) = &config.venue_filter {
            if !contains_ascii_ci(&location, filter) {
                continue;
            }
        }

        let summary = event.property_value("SUMMARY").unwrap_or("").trim();
        if summary.is_empty() {
            warn!(location = %location, "skipping calendar event without summary");
            continue;
        }

        let (home_name, away_name, home_score, away_score) = parse_summary(summary);
        let description = event.property_value("DESCRIPTION").unwrap_or("");
        let uid = event.property_value("UID").unwrap_or("");
        let game_id = extract_game_id(description, uid);
        let (start_utc, start_local) =
            parse_dtstart(event.property_value("DTSTART"), config.time_zone);

        let box_score_url = find_first_url(description);
        let summary_url = box_score_url
            .as_deref()
            .filter(|url| url.contains("p=boxscore"))
            .map(|url| url.replace("p=boxscore", "p=summary"));

        let status = if home_score.is_some() && away_score.is_some() {
            GameStatus::Final
        } else {
            GameStatus::Scheduled
        };

        let (home_name, home_role) = strip_role_tag(&home_name);
        let (away_name, away_role) = strip_role_tag(&away_name);

        let candidate_home = GameTeamLine::with_score(&home_name, home_score);
        let candidate_away = GameTeamLine::with_score(&away_name, away_score);

        // First-listed is home unless an explicit role marker says otherwise.
        let (home, away) = if home_role == Some(Role::Away) || away_role == Some(Role::Home) {
            (candidate_away, candidate_home)
        } else {
            (candidate_home, candidate_away)
        };

        let mut game = GameRecord::new(game_id, home, away);
        game.start_utc = start_utc;
        game.start_local = start_local;
        game.location = location;
        game.status = status;
        game.box_score_url = box_score_url;
        game.summary_url = summary_url;
        games.push(game);
    }

    info!(events = games.len(), "parsed calendar feed");
    games
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Home,
    Away,
}

/// Split `"<home> vs <away>"`, with an optional trailing `"(h-a)"` score
/// suffix. When the regular shape fails, fall back to a bare `vs` split and
/// leave scores unset; a summary without any `vs` becomes a home-only name.
fn parse_summary(summary: &str) -> (String, String, Option<u32>, Option<u32>) {
    let cleaned = summary.trim();
    let (body, scores) = split_score_suffix(cleaned);
    let (home_score, away_score) = scores.map_or((None, None), |(h, a)| (Some(h), Some(a)));

    if let Some((home, away)) = split_vs(body) {
        return (home, away, home_score, away_score);
    }
    // Fallback: no recognizable matchup; keep the raw text as the home side.
    (cleaned.to_string(), String::new(), None, None)
}

/// Peel a trailing `"(<digits>-<digits>)"` off a summary, if present.
fn split_score_suffix(text: &str) -> (&str, Option<(u32, u32)>) {
    let trimmed = text.trim_end();
    if !trimmed.ends_with(')') {
        return (text, None);
    }
    let Some(open) = trimmed.rfind('(') else {
        return (text, None);
    };
    let inner = &trimmed[open + 1..trimmed.len() - 1];
    if let Some((home, away)) = inner.split_once('-') {
        if let (Ok(home), Ok(away)) = (home.trim().parse::<u32>(), away.trim().parse::<u32>()) {
            return (trimmed[..open].trim_end(), Some((home, away)));
        }
    }
    (text, None)
}

fn split_vs(text: &str) -> Option<(String, String)> {
    for separator in [" vs. ", " vs "] {
        if let Some(idx) = find_ascii_ci(text, separator) {
            let home = text[..idx].trim();
            let away = text[idx + separator.len()..].trim();
            if !home.is_empty() && !away.is_empty() {
                return Some((home.to_string(), away.to_string()));
            }
        }
    }
    None
}

/// Strip a parenthesized `"(home)"`/`"(away)"` marker from a team name and
/// report which side it claimed.
fn strip_role_tag(name: &str) -> (String, Option<Role>) {
    for (tag, role) in [("(home)", Role::Home), ("(away)", Role::Away)] {
        if let Some(idx) = find_ascii_ci(name, tag) {
            let mut stripped = String::with_capacity(name.len());
            stripped.push_str(&name[..idx]);
            stripped.push_str(&name[idx + tag.len()..]);
            return (collapse_ws(&stripped), Some(role));
        }
    }
    (collapse_ws(name), None)
}

/// Locate a labeled `gameID=<digits>` token in the description or UID; fall
/// back to the raw UID, then to the unknown sentinel.
fn extract_game_id(description: &str, uid: &str) -> String {
    for source in [description, uid] {
        if let Some(idx) = find_ascii_ci(source, "gameid=") {
            let digits: String = source[idx + "gameid=".len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return digits;
            }
        }
    }
    let uid = uid.trim();
    if uid.is_empty() {
        UNKNOWN_GAME_ID.to_string()
    } else {
        uid.to_string()
    }
}

/// First well-formed http(s) URL in a free-text blob.
fn find_first_url(text: &str) -> Option<String> {
    for (idx, _) in text.match_indices("http") {
        let rest = &text[idx..];
        if rest.starts_with("http://") || rest.starts_with("https://") {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            return Some(rest[..end].to_string());
        }
    }
    None
}

/// Parse a DTSTART value, supporting `Z`-suffixed UTC and timezone-naive
/// local forms. Always populates both instants, computing one from the other
/// via the league time zone.
fn parse_dtstart(raw: Option<&str>, tz: Tz) -> (Option<DateTime<Utc>>, Option<DateTime<Tz>>) {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return (None, None);
    };

    let is_utc = raw.ends_with('Z');
    let bare = raw.trim_end_matches('Z');

    let mut naive: Option<NaiveDateTime> = None;
    for format in ["%Y%m%dT%H%M%S", "%Y%m%dT%H%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(bare, format) {
            naive = Some(parsed);
            break;
        }
    }
    // All-day events carry a bare date.
    if naive.is_none() {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(bare, "%Y%m%d") {
            naive = date.and_hms_opt(0, 0, 0);
        }
    }
    let Some(naive) = naive else {
        return (None, None);
    };

    if is_utc {
        let utc = Utc.from_utc_datetime(&naive);
        (Some(utc), Some(utc.with_timezone(&tz)))
    } else {
        let local = match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => Some(dt),
            chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest),
            chrono::LocalResult::None => None,
        };
        match local {
            Some(local) => (Some(local.with_timezone(&Utc)), Some(local)),
            None => (None, None),
        }
    }
}

/// Byte index of the first ASCII-case-insensitive occurrence of `needle`.
/// The needle must be ASCII; multi-byte characters in the haystack can never
/// start a match, so returned indexes are always valid slice boundaries.
pub(crate) fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Case-insensitive substring check used by the venue filter.
pub(crate) fn contains_ascii_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || find_ascii_ci(haystack, needle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_with_scores_parses_both_sides() {
        let (home, away, hs, aws) = parse_summary("Blue Devils vs Ice Hawks (5-3)");
        assert_eq!(home, "Blue Devils");
        assert_eq!(away, "Ice Hawks");
        assert_eq!(hs, Some(5));
        assert_eq!(aws, Some(3));
    }

    #[test]
    fn summary_without_scores_leaves_them_unset() {
        let (home, away, hs, aws) = parse_summary("Blue Devils vs. Ice Hawks");
        assert_eq!(home, "Blue Devils");
        assert_eq!(away, "Ice Hawks");
        assert_eq!(hs, None);
        assert_eq!(aws, None);
    }

    #[test]
    fn summary_fallback_keeps_raw_text() {
        let (home, away, hs, _) = parse_summary("League Social Night");
        assert_eq!(home, "League Social Night");
        assert_eq!(away, "");
        assert_eq!(hs, None);
    }

    #[test]
    fn role_tags_are_stripped_and_reported() {
        let (name, role) = strip_role_tag("Ice Hawks (HOME)");
        assert_eq!(name, "Ice Hawks");
        assert_eq!(role, Some(Role::Home));

        let (name, role) = strip_role_tag("Blue Devils");
        assert_eq!(name, "Blue Devils");
        assert_eq!(role, None);
    }

    #[test]
    fn game_id_prefers_labeled_token_over_uid() {
        assert_eq!(
            extract_game_id("See https://example.com/x?GAMEID=245&p=boxscore", "uid-9"),
            "245"
        );
        assert_eq!(extract_game_id("no token here", "uid-9"), "uid-9");
        assert_eq!(extract_game_id("", "  "), UNKNOWN_GAME_ID);
    }

    #[test]
    fn dtstart_utc_and_naive_forms_populate_both_instants() {
        let tz = chrono_tz::America::Halifax;

        let (utc, local) = parse_dtstart(Some("20251105T010000Z"), tz);
        let utc = utc.expect("utc instant");
        let local = local.expect("local instant");
        assert_eq!(utc.to_rfc3339(), "2025-11-05T01:00:00+00:00");
        assert_eq!(local.naive_local().to_string(), "2025-11-04 21:00:00");

        let (utc, local) = parse_dtstart(Some("20251104T210000"), tz);
        assert_eq!(utc.expect("utc").to_rfc3339(), "2025-11-05T01:00:00+00:00");
        assert_eq!(
            local.expect("local").naive_local().to_string(),
            "2025-11-04 21:00:00"
        );
    }

    #[test]
    fn unparseable_dtstart_yields_neither_instant() {
        let (utc, local) = parse_dtstart(Some("whenever"), chrono_tz::America::Halifax);
        assert!(utc.is_none());
        assert!(local.is_none());
    }

    #[test]
    fn first_url_is_extracted_from_free_text() {
        let description = "Box score: https://example.com/teams/default.asp?p=boxscore&gameID=245 enjoy";
        assert_eq!(
            find_first_url(description).as_deref(),
            Some("https://example.com/teams/default.asp?p=boxscore&gameID=245")
        );
        assert!(find_first_url("nothing to see").is_none());
    }
}
