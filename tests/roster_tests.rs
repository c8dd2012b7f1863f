use aahl_scraper::identity::RosterIndex;
use aahl_scraper::roster::parse_rosters;

fn load_sample() -> String {
    std::fs::read_to_string("tests/sample_rosters.html").expect("failed to read sample_rosters.html")
}

#[test]
fn parses_teams_keyed_by_slug() {
    // Arrange
    let html = load_sample();

    // Act
    let rosters = parse_rosters(&html);

    // Assert
    assert_eq!(rosters.len(), 2);

    let devils = rosters.get("blue-devils").expect("blue devils roster");
    assert_eq!(devils.team_id, "DSMALL");
    assert_eq!(devils.team_name, "Blue Devils");
    // The header row carries the thead class and is not a player.
    assert_eq!(devils.players.len(), 2);

    let hawks = rosters.get("ice-hawks").expect("ice hawks roster");
    assert_eq!(hawks.team_id, "HAWKS");
    assert_eq!(hawks.players.len(), 1);
}

#[test]
fn captaincy_markers_split_and_identifiers_derive() {
    let rosters = parse_rosters(&load_sample());
    let devils = rosters.get("blue-devils").expect("blue devils roster");

    let captain = &devils.players[0];
    assert_eq!(captain.name, "Marshall, Sam");
    assert_eq!(captain.captaincy.as_deref(), Some("C"));
    assert_eq!(captain.number.as_deref(), Some("17"));
    assert_eq!(captain.positions, vec!["C", "RW"]);
    assert_eq!(captain.player_id, "blue-devils-marshall-sam-17");
    assert_eq!(captain.hometown.as_deref(), Some("Amherst"));
    assert_eq!(captain.catches, None);

    let winger = &devils.players[1];
    assert_eq!(winger.captaincy, None);
    assert_eq!(winger.positions, vec!["LW", "D"]);
}

#[test]
fn roster_index_matches_either_name_ordering() {
    let rosters = parse_rosters(&load_sample());
    let index = RosterIndex::build(rosters.values());

    // The roster lists "Marshall, Sam"; box scores list "Sam Marshall".
    let hit = index.resolve("blue-devils", "Sam Marshall").expect("resolved");
    assert_eq!(hit.player_id, "blue-devils-marshall-sam-17");
    assert_eq!(hit.number.as_deref(), Some("17"));
    assert_eq!(hit.team_id, "DSMALL");

    // Same name on the wrong team does not match.
    assert!(index.resolve("ice-hawks", "Sam Marshall").is_none());
}

#[test]
fn pages_without_a_roster_table_yield_nothing() {
    assert!(parse_rosters("<html><body><p>maintenance</p></body></html>").is_empty());
}
