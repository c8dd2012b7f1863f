use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use aahl_scraper::classify::{ClassifyConfig, classify_games};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap()
}

fn config() -> ClassifyConfig {
    ClassifyConfig::default()
}

#[test]
fn overlapping_exports_yield_one_recent_entry() {
    // Arrange: the same game seen through a schedule export (no scores) and a
    // results export (scored), shapes differing the way the exports do.
    let schedule_shape = json!({
        "game_id": "245",
        "home": "Blue Devils",
        "away": "Ice Hawks",
        "location": "Amherst Rink 1",
        "datetime": "2025-11-04T21:00:00",
    });
    let results_shape = json!({
        "game_id": "245",
        "home": "Blue Devils",
        "away": "Ice Hawks",
        "location": "Amherst Rink 1",
        "datetime": "2025-11-04T21:00:00",
        "home_score": 5,
        "away_score": 3,
    });

    // Act
    let lists = classify_games(vec![schedule_shape, results_shape], now(), &config());

    // Assert: the scored record lands in recent, the unscored duplicate is
    // excluded from upcoming by identifier.
    assert_eq!(lists.recent.len(), 1);
    assert_eq!(lists.recent[0]["home_score"], json!(5));
    assert!(lists.upcoming.is_empty());
}

#[test]
fn fallback_composite_key_deduplicates_without_identifiers() {
    let scored = json!({
        "home": "Blue Devils",
        "away": "Ice Hawks",
        "location": "Amherst Rink 1",
        "date": "Nov 4, 2025",
        "result": "5 - 3",
    });
    let unscored = json!({
        "home": "Blue  Devils",
        "away": "Ice Hawks",
        "location": "Amherst Rink 1",
        "date": "Nov 4, 2025",
    });

    let lists = classify_games(vec![scored, unscored], now(), &config());

    // Different whitespace, same normalized names, same date triple.
    assert_eq!(lists.recent.len(), 1);
    assert!(lists.upcoming.is_empty());
}

#[test]
fn nested_team_lines_flatten_and_count_as_played() {
    let full_shape = json!({
        "game_id": "246",
        "location": "Amherst Rink 2",
        "home_line": {"name": "River Rats", "final": 2, "periods": [1, 1, 0]},
        "away_line": {"name": "Night Owls", "final": 4},
        "home": "River Rats",
        "away": "Night Owls",
    });

    let lists = classify_games(vec![full_shape], now(), &config());

    assert_eq!(lists.recent.len(), 1);
    let game = &lists.recent[0];
    assert_eq!(game["home"], json!("River Rats"));
    assert_eq!(game["home_score"], json!(2));
    assert_eq!(game["away_score"], json!(4));
    assert_eq!(game["home_periods"], json!([1, 1, 0]));
}

#[test]
fn lists_are_bounded_and_ordered() {
    // Arrange: 15 completed and 15 future games, all in-venue.
    let mut pool: Vec<Value> = Vec::new();
    for i in 0..15 {
        pool.push(json!({
            "game_id": format!("p{}", i),
            "home": format!("Team {}", i),
            "away": "Ice Hawks",
            "location": "Amherst Rink 1",
            "datetime": format!("2025-11-0{}T20:00:00", (i % 7) + 1),
            "home_score": 3,
            "away_score": 1,
        }));
        pool.push(json!({
            "game_id": format!("f{}", i),
            "home": format!("Team {}", i),
            "away": "River Rats",
            "location": "Amherst Rink 1",
            "datetime": format!("2025-12-0{}T20:00:00", (i % 7) + 1),
        }));
    }

    // Act
    let lists = classify_games(pool, now(), &config());

    // Assert
    assert_eq!(lists.recent.len(), 10);
    assert_eq!(lists.upcoming.len(), 10);

    let recent_times: Vec<&str> = lists
        .recent
        .iter()
        .map(|g| g["datetime"].as_str().expect("datetime"))
        .collect();
    let mut sorted = recent_times.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(recent_times, sorted, "recent is newest first");

    let upcoming_times: Vec<&str> = lists
        .upcoming
        .iter()
        .map(|g| g["datetime"].as_str().expect("datetime"))
        .collect();
    let mut sorted = upcoming_times.clone();
    sorted.sort();
    assert_eq!(upcoming_times, sorted, "upcoming is soonest first");
}

#[test]
fn no_game_appears_in_both_lists() {
    let mut pool: Vec<Value> = Vec::new();
    for i in 0..8 {
        pool.push(json!({
            "game_id": format!("{}", i),
            "home": "Blue Devils",
            "away": "Ice Hawks",
            "location": "Amherst Rink 1",
            "datetime": format!("2025-11-0{}T20:00:00", i + 1),
            "home_score": i,
            "away_score": 2,
        }));
        // Each game repeated without scores, as a schedule export would list it.
        pool.push(json!({
            "game_id": format!("{}", i),
            "home": "Blue Devils",
            "away": "Ice Hawks",
            "location": "Amherst Rink 1",
            "datetime": format!("2025-11-0{}T20:00:00", i + 1),
        }));
    }

    let lists = classify_games(pool, now(), &config());

    let recent_ids: Vec<&str> = lists
        .recent
        .iter()
        .map(|g| g["game_id"].as_str().expect("id"))
        .collect();
    for game in &lists.upcoming {
        let id = game["game_id"].as_str().expect("id");
        assert!(!recent_ids.contains(&id), "game {} in both lists", id);
    }
    assert_eq!(lists.recent.len(), 8);
    assert!(lists.upcoming.is_empty());
}

#[test]
fn venue_filter_and_corrections_apply_before_matching() {
    let pool = vec![
        json!({
            "game_id": "1",
            "home": "Meathead Mitchell's Team",
            "away": "Ice Hawks",
            "location": "Amherst Rink 1",
            "datetime": "2025-11-04T20:00:00",
            "home_score": 4,
            "away_score": 2,
        }),
        json!({
            "game_id": "2",
            "home": "Blue Devils",
            "away": "Ice Hawks",
            "location": "Oxford Arena",
            "datetime": "2025-11-04T20:00:00",
            "home_score": 1,
            "away_score": 0,
        }),
    ];

    let lists = classify_games(pool, now(), &config());

    // The Oxford game never enters either list; the misspelled name is fixed.
    assert_eq!(lists.recent.len(), 1);
    assert_eq!(lists.recent[0]["home"], json!("Marshall Mitchell's Team"));
}

#[test]
fn unresolved_timestamps_sort_last() {
    let pool = vec![
        json!({
            "game_id": "10",
            "home": "Blue Devils",
            "away": "Ice Hawks",
            "location": "Amherst Rink 1",
            "date": "sometime soon",
            "home_score": 2,
            "away_score": 1,
        }),
        json!({
            "game_id": "11",
            "home": "Night Owls",
            "away": "River Rats",
            "location": "Amherst Rink 1",
            "datetime": "2025-11-04T20:00:00",
            "home_score": 3,
            "away_score": 2,
        }),
    ];

    let lists = classify_games(pool, now(), &config());

    assert_eq!(lists.recent.len(), 2);
    assert_eq!(lists.recent[0]["game_id"], json!("11"));
    assert_eq!(lists.recent[1]["game_id"], json!("10"));
}
