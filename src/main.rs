use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{info, warn};

use aahl_scraper::calendar::{CalendarConfig, UNKNOWN_GAME_ID, parse_calendar};
use aahl_scraper::classify::{ClassifyConfig, classify_games};
use aahl_scraper::export::{snapshot, write_csv, write_json};
use aahl_scraper::identity::RosterIndex;
use aahl_scraper::model::game::{GameRecord, GameTeamLine};
use aahl_scraper::model::roster::TeamRoster;
use aahl_scraper::reconcile::{attach_box_score, merge_games};
use aahl_scraper::registry::build_registry;
use aahl_scraper::report::{games_within, headlines, recent_team_form};
use aahl_scraper::roster::parse_rosters;
use aahl_scraper::scoreboard::{parse_box_score, parse_keyed_table_page, parse_scoreboard};
use aahl_scraper::site;

#[derive(Debug, Parser)]
#[command(name = "aahl", about = "Scrape and reconcile Amherst Adult Hockey League feeds")]
struct Cli {
    /// Team id used to address the league site and calendar feed.
    #[arg(long, default_value = "DSMALL", global = true)]
    team: String,

    /// Directory where data files are read and written.
    #[arg(long, default_value = "data", global = true)]
    outdir: PathBuf,

    /// Venue substring filter, matched case-insensitively.
    #[arg(long, default_value = "Amherst", global = true)]
    venue: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch all feeds, reconcile them, and write the data exports.
    Scrape {
        /// Skip fetching per-game box scores.
        #[arg(long)]
        no_box_scores: bool,
    },
    /// Build recent/upcoming display lists from the schedule and results exports.
    Classify,
    /// Build the canonical player registry with attendance and delta metrics.
    Registry,
    /// Emit headlines and team form for the trailing window of results.
    Report {
        /// Trailing window in days.
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .try_init();

    let cli = Cli::parse();
    let now = Utc::now();
    match cli.command {
        Command::Scrape { no_box_scores } => scrape(&cli, now, no_box_scores),
        Command::Classify => classify(&cli, now),
        Command::Registry => registry(&cli, now),
        Command::Report { days } => report(&cli, now, days),
    }
}

fn scrape(cli: &Cli, now: DateTime<Utc>, no_box_scores: bool) -> anyhow::Result<()> {
    let calendar_config = CalendarConfig {
        venue_filter: Some(cli.venue.clone()),
        ..CalendarConfig::default()
    };
    let tz = calendar_config.time_zone;

    // Each source degrades to empty on fetch failure so one unreachable feed
    // never loses the rest of the run.
    let events = match site::fetch_text(&site::calendar_url(&cli.team)) {
        Ok(ics) => parse_calendar(&ics, &calendar_config),
        Err(e) => {
            warn!(error = %e, "calendar feed unavailable");
            Vec::new()
        }
    };

    let entries = match fetch_page(&cli.team, "scores", &[]) {
        Some(html) => parse_scoreboard(&html, tz),
        None => Vec::new(),
    };

    let mut games = merge_games(events, entries);

    let rosters: BTreeMap<String, TeamRoster> = match fetch_page(&cli.team, "roster", &[]) {
        Some(html) => parse_rosters(&html),
        None => BTreeMap::new(),
    };
    let roster_index = RosterIndex::build(rosters.values());

    if !no_box_scores {
        for game in games.iter_mut().filter(|game| game.is_final()) {
            let Some(url) = game.box_score_url.clone() else {
                continue;
            };
            match site::fetch_text(&url) {
                Ok(html) => attach_box_score(game, &parse_box_score(&html), &roster_index),
                Err(e) => warn!(game_id = %game.game_id, error = %e, "box score unavailable"),
            }
        }
    }

    let player_stats = match fetch_page(&cli.team, "stats", &[("psort", "points")]) {
        Some(html) => parse_keyed_table_page(&html),
        None => Vec::new(),
    };
    let standings = match fetch_page(&cli.team, "standings", &[]) {
        Some(html) => parse_keyed_table_page(&html),
        None => Vec::new(),
    };

    let schedule: Vec<Value> = games
        .iter()
        .filter(|game| !game.is_final())
        .map(GameRecord::flat_value)
        .collect();
    let results: Vec<Value> = games
        .iter()
        .filter(|game| game.is_final())
        .map(GameRecord::flat_value)
        .collect();
    let full: Vec<Value> = games.iter().map(GameRecord::full_value).collect();
    let stats_values: Vec<Value> = player_stats.iter().map(|row| json!(row)).collect();
    let standings_values: Vec<Value> = standings.iter().map(|row| json!(row)).collect();

    let dir = &cli.outdir;
    write_json(&schedule, &dir.join("schedule.json"))?;
    write_json(&results, &dir.join("results.json"))?;
    write_json(&full, &dir.join("games_full.json"))?;
    write_json(&rosters.values().collect::<Vec<_>>(), &dir.join("rosters.json"))?;
    write_json(&player_stats, &dir.join("player_stats.json"))?;
    write_json(&standings, &dir.join("standings.json"))?;

    write_csv(&schedule, &dir.join("schedule.csv"))?;
    write_csv(&results, &dir.join("results.csv"))?;
    write_csv(&stats_values, &dir.join("player_stats.csv"))?;
    write_csv(&standings_values, &dir.join("standings.csv"))?;

    for name in ["schedule.json", "results.json", "player_stats.json", "standings.json"] {
        snapshot(dir, name, now)?;
    }

    info!(
        games = games.len(),
        teams = rosters.len(),
        stat_rows = player_stats.len(),
        "scrape complete"
    );
    Ok(())
}

fn classify(cli: &Cli, now: DateTime<Utc>) -> anyhow::Result<()> {
    let mut pool = read_records(&cli.outdir.join("schedule.json"))?;
    pool.extend(read_records(&cli.outdir.join("results.json"))?);

    let config = ClassifyConfig {
        venue_filter: cli.venue.clone(),
        ..ClassifyConfig::default()
    };
    let lists = classify_games(pool, now, &config);

    write_json(
        &json!({"recent": lists.recent, "upcoming": lists.upcoming}),
        &cli.outdir.join("display.json"),
    )
}

fn registry(cli: &Cli, now: DateTime<Utc>) -> anyhow::Result<()> {
    let rosters: Vec<TeamRoster> = read_json_or_default(&cli.outdir.join("rosters.json"))?;
    let rosters: BTreeMap<String, TeamRoster> = rosters
        .into_iter()
        .map(|roster| (roster.team_slug.clone(), roster))
        .collect();
    let stats: Vec<BTreeMap<String, String>> =
        read_json_or_default(&cli.outdir.join("player_stats.json"))?;
    let results = games_from_flat(&read_records(&cli.outdir.join("results.json"))?);
    let previous = previous_stats_snapshot(&cli.outdir)?;

    let players = build_registry(&rosters, &stats, &results, previous.as_deref());
    write_json(
        &json!({"generated_at": now.to_rfc3339(), "players": players}),
        &cli.outdir.join("player_registry.json"),
    )?;
    snapshot(&cli.outdir, "player_registry.json", now)?;
    Ok(())
}

fn report(cli: &Cli, now: DateTime<Utc>, days: i64) -> anyhow::Result<()> {
    let results = games_from_flat(&read_records(&cli.outdir.join("results.json"))?);
    let recent = games_within(&results, now, days);

    write_json(&headlines(&recent), &cli.outdir.join("headlines.json"))?;
    write_json(
        &json!({
            "generated_at": now.to_rfc3339(),
            "window_days": days,
            "recent_team_form": recent_team_form(&recent),
        }),
        &cli.outdir.join("weekly_report.json"),
    )
}

fn fetch_page(team: &str, page: &str, extra: &[(&str, &str)]) -> Option<String> {
    let url = match site::team_page_url(team, page, extra) {
        Ok(url) => url,
        Err(e) => {
            warn!(page, error = %e, "could not build page url");
            return None;
        }
    };
    match site::fetch_text(&url) {
        Ok(html) => Some(html),
        Err(e) => {
            warn!(page, error = %e, "page unavailable");
            None
        }
    }
}

fn read_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    read_json_or_default(path)
}

/// Read a JSON export, treating a missing file as empty rather than an error
/// so subcommands can run on partial data directories.
fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))
}

/// Previous player stats snapshot for delta computation: the second-newest
/// history file, since the newest is the snapshot of the current run.
fn previous_stats_snapshot(dir: &Path) -> anyhow::Result<Option<Vec<BTreeMap<String, String>>>> {
    let folder = dir.join("history").join("player_stats");
    if !folder.exists() {
        return Ok(None);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    if files.len() < 2 {
        return Ok(None);
    }
    let previous = &files[files.len() - 2];
    Ok(Some(read_json_or_default(previous)?))
}

/// Rebuild minimal game records from a flat export so file-driven subcommands
/// can reuse the same aggregation code as the in-process pipeline.
fn games_from_flat(records: &[Value]) -> Vec<GameRecord> {
    records
        .iter()
        .filter_map(|record| {
            let fields = record.as_object()?;
            let home = fields.get("home").and_then(Value::as_str)?;
            let away = fields.get("away").and_then(Value::as_str)?;

            let game_id = fields
                .get("game_id")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_GAME_ID)
                .to_string();
            let mut game = GameRecord::new(
                game_id,
                GameTeamLine::with_score(home, score_field(fields, "home_score")),
                GameTeamLine::with_score(away, score_field(fields, "away_score")),
            );
            game.location = fields
                .get("location")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            game.start_utc = fields
                .get("start_utc")
                .and_then(Value::as_str)
                .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
                .map(|dt| dt.with_timezone(&Utc));
            game.recompute_status();
            Some(game)
        })
        .collect()
}

fn score_field(fields: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    match fields.get(key)? {
        Value::Number(number) => number.as_u64().map(|n| n as u32),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
