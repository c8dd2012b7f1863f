use std::collections::BTreeSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Persist any serializable value as pretty-printed JSON, creating parent
/// directories as needed.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body)?;
    info!(path = %path.display(), "wrote json export");
    Ok(())
}

/// Persist a sequence of flat records as CSV. The column set is the union of
/// keys across all records, ordered by first appearance. Empty input writes
/// nothing at all, matching the JSON/CSV pairing convention of the exports.
pub fn write_csv(records: &[Value], path: &Path) -> anyhow::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    ensure_parent(path)?;

    let mut columns: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for record in records {
        if let Some(fields) = record.as_object() {
            for key in fields.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut out = fs::File::create(path)?;
    writeln!(out, "{}", columns.iter().map(|c| csv_quote(c)).collect::<Vec<_>>().join(","))?;
    for record in records {
        let fields = record.as_object();
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                let cell = fields.and_then(|f| f.get(column)).map(csv_cell).unwrap_or_default();
                csv_quote(&cell)
            })
            .collect();
        writeln!(out, "{}", row.join(","))?;
    }
    info!(path = %path.display(), rows = records.len(), "wrote csv export");
    Ok(())
}

/// Copy an existing export into `history/<name>/<stem>-<stamp>.json` under the
/// same data directory. Missing sources are skipped silently so partial scrape
/// runs still snapshot what they produced.
pub fn snapshot(data_dir: &Path, file_name: &str, now: DateTime<Utc>) -> anyhow::Result<Option<PathBuf>> {
    let source = data_dir.join(file_name);
    if !source.exists() {
        return Ok(None);
    }

    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let stamp = now.format("%Y%m%dT%H%M%SZ");
    let target = data_dir
        .join("history")
        .join(stem)
        .join(format!("{}-{}.json", stem, stamp));
    ensure_parent(&target)?;
    fs::copy(&source, &target)?;
    info!(path = %target.display(), "wrote history snapshot");
    Ok(Some(target))
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Quote a cell when it contains a comma, quote, or newline; embedded quotes
/// double per RFC 4180.
fn csv_quote(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_columns_union_in_first_seen_order() {
        let dir = std::env::temp_dir().join("aahl-export-test-columns");
        let path = dir.join("out.csv");
        let records = vec![
            json!({"home": "Blue Devils", "away": "Ice Hawks"}),
            json!({"home": "Night Owls", "result": "5 - 3"}),
        ];
        write_csv(&records, &path).expect("csv written");
        let body = fs::read_to_string(&path).expect("readable");
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some("home,away,result"));
        assert_eq!(lines.next(), Some("Blue Devils,Ice Hawks,"));
        assert_eq!(lines.next(), Some("Night Owls,,5 - 3"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn csv_quoting_doubles_embedded_quotes() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn empty_record_set_writes_no_csv() {
        let path = std::env::temp_dir().join("aahl-export-test-empty").join("out.csv");
        write_csv(&[], &path).expect("no-op");
        assert!(!path.exists());
    }

    #[test]
    fn snapshot_places_copy_under_history() {
        let dir = std::env::temp_dir().join("aahl-export-test-snapshot");
        fs::create_dir_all(&dir).expect("data dir");
        fs::write(dir.join("results.json"), "[]").expect("seed export");

        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 11, 5, 1, 0, 0).unwrap();
        let target = snapshot(&dir, "results.json", now)
            .expect("snapshot ok")
            .expect("source existed");
        assert!(target.ends_with("history/results/results-20251105T010000Z.json"));
        assert!(target.exists());

        assert!(snapshot(&dir, "missing.json", now).expect("ok").is_none());
        fs::remove_dir_all(&dir).ok();
    }
}
