use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use scraper::{CaseSensitivity, ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::identity::collapse_ws;
use crate::model::game::{GameTeamLine, ScoreBoardEntry};
use crate::model::stats::{BoxScore, PlayerTable, RawPlayerRow};
use crate::site::BASE_TEAM_URL;

/// Ordered datetime formats accepted for the scoreboard header, first success
/// wins. A date without any parseable time falls back to midnight local.
const HEADER_DATETIME_FORMATS: [&str; 2] = ["%b %d, %Y %I:%M %p", "%b %d, %Y %I %p"];
const HEADER_DATE_FORMAT: &str = "%b %d, %Y";

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|_| unreachable!())
}

/// Parse the league scores page into scoreboard entries.
///
/// Identity is mandatory at this layer: entries whose box-score link carries
/// no numeric `gameID` are discarded, as are entries without exactly two team
/// rows. The reconciler keys its merge on the id.
pub fn parse_scoreboard(html: &str, tz: Tz) -> Vec<ScoreBoardEntry> {
    let document = Html::parse_document(html);
    let board_sel = sel("div.scoreBoard.periodScore");
    let header_sel = sel("div.gameDate");
    let span_sel = sel("span");
    let division_sel = sel("td.location");
    let row_sel = sel("tbody tr");
    let link_sel = sel("div.scoreSummary a");

    let mut entries: Vec<ScoreBoardEntry> = Vec::new();
    for board in document.select(&board_sel) {
        let Some(parent) = board.parent().and_then(ElementRef::wrap) else {
            continue;
        };

        let mut location = String::new();
        let mut date_text = String::new();
        let mut time_text = String::new();
        if let Some(header) = parent.select(&header_sel).next() {
            let spans: Vec<String> = header
                .select(&span_sel)
                .map(|span| clean_bullet_text(&element_text(&span)))
                .collect();
            if let Some(text) = spans.first() {
                location = text.clone();
            }
            if let Some(text) = spans.get(1) {
                date_text = text.clone();
            }
            if let Some(text) = spans.get(2) {
                time_text = text.clone();
            }
        }

        let division = board
            .select(&division_sel)
            .next()
            .map(|cell| element_text(&cell))
            .filter(|text| !text.is_empty());

        let start_local = parse_header_datetime(&date_text, &time_text, tz);

        let teams: Vec<GameTeamLine> = board
            .select(&row_sel)
            .filter(|row| row.select(&sel("td.team")).next().is_some())
            .map(|row| parse_score_team_row(&row))
            .collect();
        if teams.len() != 2 {
            warn!(teams = teams.len(), location = %location, "skipping scoreboard block without two team rows");
            continue;
        }

        let box_score_url = parent
            .select(&link_sel)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
            .and_then(absolute_url);
        let Some(game_id) = box_score_url.as_deref().and_then(game_id_from_url) else {
            warn!(location = %location, "skipping scoreboard entry without resolvable game id");
            continue;
        };
        let summary_url = box_score_url
            .as_deref()
            .filter(|u| u.contains("p=boxscore"))
            .map(|u| u.replace("p=boxscore", "p=summary"));

        entries.push(ScoreBoardEntry {
            game_id,
            location,
            division,
            start_local,
            teams,
            box_score_url,
            summary_url,
        });
    }

    info!(entries = entries.len(), "parsed scoreboard page");
    entries
}

/// One team's score row: final and period scores are digits-only, anything
/// else stays null; the winner flag comes from a row-level `win` class.
fn parse_score_team_row(row: &ElementRef) -> GameTeamLine {
    let name = row
        .select(&sel("td.team"))
        .next()
        .map(|cell| element_text(&cell))
        .unwrap_or_default();

    let final_score = row
        .select(&sel("td.final"))
        .next()
        .and_then(|cell| digits_only(&element_text(&cell)));

    let periods: Vec<Option<u32>> = row
        .select(&sel("td.period"))
        .map(|cell| digits_only(&element_text(&cell)))
        .collect();

    let is_winner = row
        .value()
        .has_class("win", CaseSensitivity::AsciiCaseInsensitive);

    let mut line = GameTeamLine::new(&name);
    line.final_score = final_score;
    line.periods = periods;
    line.is_winner = Some(is_winner);
    line
}

/// Table classification tags for a box-score page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    PlayerStats,
    ScoringSummary,
    Penalties,
    Other,
}

/// Classify a table by its normalized header set, as a scored-candidate
/// selection: each kind scores the headers it recognizes, the best score
/// meeting its threshold wins, ties go to the earlier candidate. Kept as a
/// pure function so ambiguous pages are easy to test without fetching.
pub fn classify_table(headers: &[String]) -> TableKind {
    let has = |name: &str| headers.iter().any(|h| h == name);

    let scoring = ["perperiod", "per_period", "time", "team"]
        .iter()
        .filter(|h| has(h))
        .count();
    let penalties = usize::from(has("infraction")) * 2 + usize::from(has("length")) * 2;
    let players =
        usize::from(has("name") || has("player")) * 2 + usize::from(has("g") || has("goals")) * 2;

    let mut best = (TableKind::Other, 0usize);
    for (kind, score, threshold) in [
        (TableKind::ScoringSummary, scoring, 3),
        (TableKind::Penalties, penalties, 2),
        (TableKind::PlayerStats, players, 4),
    ] {
        if score >= threshold && score > best.1 {
            best = (kind, score);
        }
    }
    best.0
}

/// Parse a box-score page: header scoreboard, scoring summary, penalties, and
/// per-team player tables. Team identity for each player table is assigned by
/// the reconciler; header text for a team name is unreliable, so tables carry
/// only page order plus the scoreboard's team listing.
pub fn parse_box_score(html: &str) -> BoxScore {
    let document = Html::parse_document(html);

    let mut team_order: Vec<String> = Vec::new();
    if let Some(table) = document.select(&sel("div.scoreBoard table")).next() {
        for row in table_rows(&table).iter().skip(1) {
            if let Some(first) = row.first().filter(|cell| !cell.is_empty()) {
                team_order.push(first.clone());
            }
        }
    }

    let mut box_score = BoxScore::default();
    for table in document.select(&sel("table")) {
        let raw_rows = table_rows(&table);
        let Some((header_row, data_rows)) = raw_rows.split_first() else {
            continue;
        };
        let headers: Vec<String> = header_row.iter().map(|cell| normalize_header(cell)).collect();

        match classify_table(&headers) {
            TableKind::ScoringSummary => {
                box_score
                    .scoring_summary
                    .extend(data_rows.iter().map(|row| keyed_row(&headers, row)).filter(|r| !r.is_empty()));
            }
            TableKind::Penalties => {
                box_score
                    .penalties
                    .extend(data_rows.iter().map(|row| keyed_row(&headers, row)).filter(|r| !r.is_empty()));
            }
            TableKind::PlayerStats => {
                let rows: Vec<RawPlayerRow> = data_rows
                    .iter()
                    .filter(|row| !is_aggregate_row(row))
                    .filter_map(|row| parse_player_row(&headers, row))
                    .collect();
                let team_name = team_order.get(box_score.player_tables.len()).cloned();
                box_score.player_tables.push(PlayerTable { team_name, rows });
            }
            TableKind::Other => {}
        }
    }

    box_score.team_order = team_order;
    info!(
        player_tables = box_score.player_tables.len(),
        scoring_events = box_score.scoring_summary.len(),
        penalties = box_score.penalties.len(),
        "parsed box score page"
    );
    box_score
}

/// Rows containing aggregate-looking text are not players.
fn is_aggregate_row(row: &[String]) -> bool {
    row.iter().any(|cell| {
        let lowered = cell.to_lowercase();
        lowered.contains("team stats") || lowered.contains("overall stats")
    })
}

fn parse_player_row(headers: &[String], row: &[String]) -> Option<RawPlayerRow> {
    let record = keyed_row(headers, row);
    let field = |names: &[&str]| -> Option<String> {
        names
            .iter()
            .find_map(|name| record.get(*name))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let name = field(&["name", "player"])?;
    Some(RawPlayerRow {
        number: field(&["no", "number"]),
        name,
        positions: field(&["pos", "position"]).unwrap_or_default(),
        goals: field(&["g", "goals"]).as_deref().and_then(lenient_int),
        assists: field(&["a", "assists"]).as_deref().and_then(lenient_int),
        points: field(&["pts", "points"]).as_deref().and_then(lenient_int),
        penalty_minutes: field(&["pim", "pen"]).as_deref().and_then(lenient_int),
    })
}

/// Lenient numeric coercion: integer, then integer-of-float, else absent.
/// Absent stays absent here; downstream code normalizes it to 0.
pub(crate) fn lenient_int(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(int) = value.parse::<u32>() {
        return Some(int);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f as u32)
}

/// Parse an arbitrary keyed table page (season stats, standings) into rows of
/// header-keyed text fields, using the most plausible table on the page:
/// explicit class candidates first, then the table with the most rows.
pub fn parse_keyed_table_page(html: &str) -> Vec<BTreeMap<String, String>> {
    let document = Html::parse_document(html);
    let Some(table) = best_table(&document) else {
        warn!("no usable table found on page");
        return Vec::new();
    };

    let raw_rows = table_rows(&table);
    let Some((header_row, data_rows)) = raw_rows.split_first() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.iter().map(|cell| normalize_header(cell)).collect();

    data_rows
        .iter()
        .filter(|row| row.len() >= 2)
        .map(|row| {
            if headers.len() == row.len() {
                keyed_row(&headers, row)
            } else {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| (format!("col_{}", i), cell.clone()))
                    .collect()
            }
        })
        .collect()
}

const TABLE_CLASS_CANDIDATES: [&str; 5] = [
    "table",
    "schedule-table",
    "data-table",
    "stats-table",
    "standings-table",
];

fn best_table(document: &Html) -> Option<ElementRef<'_>> {
    for candidate in TABLE_CLASS_CANDIDATES {
        if let Ok(selector) = Selector::parse(&format!("table.{}", candidate)) {
            if let Some(table) = document.select(&selector).next() {
                return Some(table);
            }
        }
    }
    let tr = sel("tr");
    document
        .select(&sel("table"))
        .max_by_key(|table| table.select(&tr).count())
}

fn table_rows(table: &ElementRef) -> Vec<Vec<String>> {
    let cell_sel = sel("td, th");
    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in table.select(&sel("tr")) {
        let cells: Vec<String> = row.select(&cell_sel).map(|cell| element_text(&cell)).collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    rows
}

fn keyed_row(headers: &[String], row: &[String]) -> BTreeMap<String, String> {
    headers
        .iter()
        .zip(row.iter())
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, cell)| (header.clone(), cell.clone()))
        .collect()
}

/// Convert a header label into a normalized snake_case key.
pub(crate) fn normalize_header(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut pending = false;
    for ch in text.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending && !key.is_empty() {
                key.push('_');
            }
            pending = false;
            key.push(ch.to_ascii_lowercase());
        } else {
            pending = true;
        }
    }
    key
}

fn element_text(element: &ElementRef) -> String {
    collapse_ws(&element.text().collect::<Vec<_>>().join(" "))
}

fn clean_bullet_text(text: &str) -> String {
    collapse_ws(&text.replace('\u{2022}', " "))
}

fn digits_only(text: &str) -> Option<u32> {
    let text = text.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn absolute_url(href: &str) -> Option<String> {
    Url::parse(BASE_TEAM_URL)
        .ok()?
        .join(href)
        .ok()
        .map(|url| url.to_string())
}

fn game_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("gameID"))
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
}

/// Combine the header's date and optional time text using the accepted format
/// list, stopping at the first success. A bare date parses to midnight local.
fn parse_header_datetime(date_text: &str, time_text: &str, tz: Tz) -> Option<DateTime<Tz>> {
    if date_text.is_empty() {
        return None;
    }

    let mut naive: Option<NaiveDateTime> = None;
    if !time_text.is_empty() {
        let candidate = format!("{} {}", date_text, time_text);
        for format in HEADER_DATETIME_FORMATS {
            let mut parsed = chrono::format::Parsed::new();
            let items = chrono::format::StrftimeItems::new(format);
            if chrono::format::parse(&mut parsed, &candidate, items).is_err() {
                continue;
            }
            // Hour-only formats leave the minute unset; it defaults to zero.
            if parsed.minute().is_none() && parsed.set_minute(0).is_err() {
                continue;
            }
            if let Ok(dt) = parsed.to_naive_datetime_with_offset(0) {
                naive = Some(dt);
                break;
            }
        }
    }
    if naive.is_none() {
        if let Ok(date) = NaiveDate::parse_from_str(date_text, HEADER_DATE_FORMAT) {
            naive = date.and_hms_opt(0, 0, 0);
        }
    }

    match tz.from_local_datetime(&naive?) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest),
        chrono::LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn classifies_player_scoring_and_penalty_tables() {
        assert_eq!(
            classify_table(&headers(&["no", "name", "pos", "g", "a", "pts", "pim"])),
            TableKind::PlayerStats
        );
        assert_eq!(
            classify_table(&headers(&["perperiod", "time", "team", "goal"])),
            TableKind::ScoringSummary
        );
        assert_eq!(
            classify_table(&headers(&["player", "infraction", "length"])),
            TableKind::Penalties
        );
        assert_eq!(classify_table(&headers(&["w", "l", "t"])), TableKind::Other);
    }

    #[test]
    fn lenient_int_tries_integer_then_float_then_absent() {
        assert_eq!(lenient_int("7"), Some(7));
        assert_eq!(lenient_int(" 3.0 "), Some(3));
        assert_eq!(lenient_int(""), None);
        assert_eq!(lenient_int("-"), None);
        assert_eq!(lenient_int("dnp"), None);
    }

    #[test]
    fn header_normalization_is_snake_case() {
        assert_eq!(normalize_header("  Player Name "), "player_name");
        assert_eq!(normalize_header("Pts/G"), "pts_g");
        assert_eq!(normalize_header("GP"), "gp");
    }

    #[test]
    fn game_id_requires_numeric_query_parameter() {
        assert_eq!(
            game_id_from_url("https://example.com/teams/default.asp?p=boxscore&gameID=245"),
            Some("245".to_string())
        );
        assert_eq!(
            game_id_from_url("https://example.com/teams/default.asp?p=boxscore&gameID=abc"),
            None
        );
        assert_eq!(game_id_from_url("https://example.com/teams/default.asp"), None);
    }

    #[test]
    fn header_datetime_formats_fall_back_in_order() {
        let tz = chrono_tz::America::Halifax;
        let full = parse_header_datetime("Nov 4, 2025", "9:00 PM", tz).expect("full");
        assert_eq!(full.naive_local().to_string(), "2025-11-04 21:00:00");

        let date_only = parse_header_datetime("Nov 4, 2025", "", tz).expect("date only");
        assert_eq!(date_only.naive_local().to_string(), "2025-11-04 00:00:00");

        assert!(parse_header_datetime("", "9:00 PM", tz).is_none());
        assert!(parse_header_datetime("sometime", "soon", tz).is_none());
    }
}
