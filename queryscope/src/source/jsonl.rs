// queryscope/src/source/jsonl.rs
//
// JSON export adapter. Reads one file or every *.json / *.jsonl file in a
// directory (sorted by name, not recursive). Accepted file shapes:
//
//   - JSON lines, one result object per line
//   - a single top-level array of result objects
//   - either of the above with rows wrapped as {"result": {...}}
//
// Users are merged across files by their effective identity key, so a case
// split over several exports still sessionizes as one timeline. Each call
// re-reads the files: streams are not restartable. Text lookups stream rows
// file by file and never build users.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{DataVersion, Interactivity, QuerySource, Stream};
use crate::error::{Error, Result};
use crate::model::{user_key, Query, User};

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    version: DataVersion,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>, version: DataVersion) -> Self {
        Self { path: path.into(), version }
    }

    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let meta = std::fs::metadata(&self.path).map_err(|e| Error::io(&self.path, e))?;
        if meta.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let mut files = Vec::new();
        let entries = std::fs::read_dir(&self.path).map_err(|e| Error::io(&self.path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.path, e))?;
            let p = entry.path();
            let is_json = matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("json") | Some("jsonl")
            );
            if p.is_file() && is_json {
                files.push(p);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Materialize the whole corpus, merged by user key, in first-seen order.
    pub fn load_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut next_id = 0u64;
        let mut skipped = 0usize;

        for file in self.files()? {
            let rows = read_rows(&file)?;
            info!("Read {} rows from {}", rows.len(), file.display());
            for row in rows {
                let Some(rec) = decode_row(&row) else {
                    skipped += 1;
                    continue;
                };
                let key = user_key(rec.name.as_deref(), rec.case_id.as_deref());
                let slot = *index.entry(key).or_insert_with(|| {
                    users.push(User {
                        name: rec.name.clone(),
                        case_id: rec.case_id.clone(),
                        ..User::default()
                    });
                    users.len() - 1
                });
                next_id += 1;
                users[slot].push_query(rec.query.with_id(next_id));
            }
        }

        if skipped > 0 {
            warn!("Skipped {} rows without user/time/search", skipped);
        }
        for user in &mut users {
            self.version.mark_interactive(user);
        }
        debug!("Loaded {} users, {} queries", users.len(), next_id);
        Ok(users)
    }
}

impl QuerySource for JsonFileSource {
    fn get_users(&self) -> Result<Stream<'_, User>> {
        let users = self.load_users()?;
        Ok(Box::new(users.into_iter().map(|u| Ok(u.without_queries()))))
    }

    fn get_queries(&self, filter: Interactivity) -> Result<Stream<'_, Query>> {
        let users = self.load_users()?;
        Ok(Box::new(
            users
                .into_iter()
                .flat_map(|u| u.queries.into_iter())
                .filter(move |q| filter.admits(q))
                .map(Ok),
        ))
    }

    fn get_users_with_queries(&self) -> Result<Stream<'_, User>> {
        let users = self.load_users()?;
        Ok(Box::new(users.into_iter().map(Ok)))
    }

    /// Ids match the ones `load_users` assigns.
    fn get_interactive_queries_with_text<'a>(&'a self, text: &'a str) -> Result<Stream<'a, Query>> {
        let version = self.version;
        let mut next_id = 0u64;
        let rows = self.files()?.into_iter().flat_map(|file| -> RowStream {
            match read_rows(&file) {
                Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        });
        Ok(Box::new(rows.filter_map(move |row| {
            let row = match row {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            let rec = decode_row(&row)?;
            next_id += 1;
            let q = rec.query;
            if q.text != text || !version.is_interactive(q.search_type.as_deref()) {
                return None;
            }
            let mut q = q.with_id(next_id).interactive(true);
            q.user = user_key(rec.name.as_deref(), rec.case_id.as_deref());
            Some(Ok(q))
        })))
    }
}

// ── Row decoding ──────────────────────────────────────────────────────────────

type RowStream = Box<dyn Iterator<Item = Result<Map<String, Value>>>>;

struct DecodedRow {
    name: Option<String>,
    case_id: Option<String>,
    query: Query,
}

fn read_rows(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut rows = Vec::new();

    if content.trim_start().starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            line: 1,
            source,
        })?;
        rows.extend(values.into_iter().filter_map(unwrap_row));
        return Ok(rows);
    }

    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => rows.extend(unwrap_row(v)),
            Err(e) => warn!("Parse error in {} line {}: {}", path.display(), n + 1, e),
        }
    }
    Ok(rows)
}

/// Accept a bare result object or one wrapped in {"result": {...}}.
fn unwrap_row(v: Value) -> Option<Map<String, Value>> {
    match v {
        Value::Object(mut obj) => match obj.remove("result") {
            Some(Value::Object(inner)) => Some(inner),
            Some(other) => {
                obj.insert("result".into(), other);
                Some(obj)
            }
            None => Some(obj),
        },
        _ => None,
    }
}

fn decode_row(row: &Map<String, Value>) -> Option<DecodedRow> {
    let text = text_field(row, &["search"])?.trim().to_string();
    if text.is_empty() {
        return None;
    }
    let time = field(row, &["_time"]).and_then(parse_timestamp)?;
    let name = text_field(row, &["user"])?;

    let mut query = Query::new(text, time);
    query.execution_time = field(row, &["runtime", "total_run_time"]).and_then(lenient_f64);
    query.earliest_event = field(row, &["search_et"]).and_then(lenient_f64);
    query.latest_event = field(row, &["search_lt"]).and_then(lenient_f64);
    query.range = field(row, &["range"]).and_then(lenient_f64);
    query.is_realtime = field(row, &["is_realtime"]).and_then(lenient_bool);
    query.search_type = text_field(row, &["searchtype", "search_type"]);
    query.search_id = text_field(row, &["search_id"]);
    query.saved_search_name = text_field(row, &["savedsearch_name"]);

    Some(DecodedRow {
        name: Some(name),
        case_id: text_field(row, &["case_id"]),
        query,
    })
}

/// First non-null value among `names`.
fn field<'a>(row: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().filter_map(|n| row.get(*n)).find(|v| !v.is_null())
}

fn text_field(row: &Map<String, Value>, names: &[&str]) -> Option<String> {
    match field(row, names)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Epoch seconds from a number, a numeric string, or a datetime string.
pub(crate) fn parse_timestamp(v: &Value) -> Option<f64> {
    if let Some(secs) = lenient_f64(v) {
        return Some(secs);
    }
    let s = v.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(epoch_secs(dt.timestamp(), dt.timestamp_subsec_nanos()));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(epoch_secs(dt.timestamp(), dt.timestamp_subsec_nanos()));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            let dt = naive.and_utc();
            return Some(epoch_secs(dt.timestamp(), dt.timestamp_subsec_nanos()));
        }
    }
    None
}

fn epoch_secs(secs: i64, nanos: u32) -> f64 {
    secs as f64 + nanos as f64 / 1e9
}
