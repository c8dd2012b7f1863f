use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::identity::{collapse_ws, derive_player_id, slugify};
use crate::model::roster::{RosterPlayer, TeamRoster};

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|_| unreachable!())
}

/// Parse the league roster page into rosters keyed by team slug. Rosters are
/// rebuilt wholesale on every parse; player identifiers are derived here and
/// never change across re-parses unless the name or number text changes.
pub fn parse_rosters(html: &str) -> BTreeMap<String, TeamRoster> {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&sel("table#group_byTeam")).next() else {
        warn!("no roster table found on page");
        return BTreeMap::new();
    };

    // tbody elements cannot nest, so a descendant select walks them in order.
    let bodies: Vec<ElementRef> = table.select(&sel("tbody")).collect();
    let mut rosters: BTreeMap<String, TeamRoster> = BTreeMap::new();

    let mut i = 0;
    while i < bodies.len() {
        let header = bodies[i];
        let Some(team_id) = header
            .value()
            .attr("id")
            .and_then(|id| id.strip_prefix("parent_"))
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            i += 1;
            continue;
        };

        let team_name = header
            .select(&sel("span.teamLabel"))
            .next()
            .map(|span| element_text(&span))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| team_id.to_string());
        let team_slug = slugify(&team_name);

        i += 1;
        let Some(roster_body) = bodies.get(i) else {
            break;
        };

        let mut players: Vec<RosterPlayer> = Vec::new();
        for row in roster_body.select(&sel("tr.modGroupItem")) {
            if row.value().classes().any(|class| class == "thead") {
                continue;
            }

            let cell = |class: &str| -> Option<String> {
                row.select(&sel(&format!("td.{}", class)))
                    .next()
                    .map(|cell| element_text(&cell))
                    .filter(|text| !text.is_empty())
            };

            let raw_name = cell("nameLabel").unwrap_or_default();
            if raw_name.is_empty() {
                continue;
            }
            let (name, captaincy) = split_captaincy(&raw_name);
            let number = cell("playernumberLabel");
            let positions = split_positions(cell("positionsAllLabel").as_deref());
            let player_id = derive_player_id(&team_slug, &name, number.as_deref());

            players.push(RosterPlayer {
                number,
                name,
                positions,
                player_id,
                captaincy,
                height: cell("heightLabel"),
                weight: cell("weightLabel"),
                shoots: cell("shootsLabel"),
                catches: cell("catchesLabel"),
                hometown: cell("hometownLabel"),
            });
        }

        rosters.insert(
            team_slug.clone(),
            TeamRoster {
                team_id: team_id.to_string(),
                team_name,
                team_slug,
                players,
            },
        );

        i += 1;
    }

    info!(teams = rosters.len(), "parsed roster page");
    rosters
}

/// Strip a trailing captaincy marker like `"(C)"` or `"(A)"` from a roster
/// name and report it separately.
fn split_captaincy(raw: &str) -> (String, Option<String>) {
    let trimmed = raw.trim();
    for marker in ["(C)", "(c)", "(A)", "(a)"] {
        if let Some(body) = trimmed.strip_suffix(marker) {
            let letter = marker[1..2].to_ascii_uppercase();
            return (collapse_ws(body), Some(letter));
        }
    }
    (collapse_ws(trimmed), None)
}

pub(crate) fn split_positions(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    raw.split(['/', ',', '\u{b7}'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn element_text(element: &ElementRef) -> String {
    collapse_ws(&element.text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captaincy_markers_are_split_from_names() {
        assert_eq!(
            split_captaincy("Marshall, Sam (C)"),
            ("Marshall, Sam".to_string(), Some("C".to_string()))
        );
        assert_eq!(
            split_captaincy("McCrossin, Pat (A)"),
            ("McCrossin, Pat".to_string(), Some("A".to_string()))
        );
        assert_eq!(split_captaincy("Plain Name"), ("Plain Name".to_string(), None));
    }

    #[test]
    fn positions_split_on_every_separator() {
        assert_eq!(split_positions(Some("C/RW")), vec!["C", "RW"]);
        assert_eq!(split_positions(Some("D, G")), vec!["D", "G"]);
        assert_eq!(split_positions(Some("LW \u{b7} C")), vec!["LW", "C"]);
        assert!(split_positions(None).is_empty());
    }
}
