// queryscope/src/engine/dispatcher.rs
//
// Writes pass results to JSONL files in an output directory. Append mode:
// repeated exports into one directory accumulate.
//
//   sessions.jsonl            clean view, one session per line
//   bad_sessions.jsonl        view including suspicious queries
//   suspicious_queries.jsonl  every flagged query
//   groups.jsonl              one statistical verdict per group

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::engine::classifier::GroupVerdict;
use crate::engine::pipeline::PassOutput;
use crate::error::{Error, Result};
use crate::model::{QueryRecord, SessionView, User};

pub const SUSPICIOUS_QUERIES_FILE: &str = "suspicious_queries.jsonl";
pub const GROUPS_FILE: &str = "groups.jsonl";

pub fn sessions_file(view: SessionView) -> String {
    format!("{}.jsonl", view)
}

/// Line counts per file written by `export`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportCounts {
    pub sessions: usize,
    pub bad_sessions: usize,
    pub suspicious_queries: usize,
    pub groups: usize,
}

pub struct Dispatcher {
    out: PathBuf,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let out: PathBuf = output_dir.into();
        std::fs::create_dir_all(&out).map_err(|e| Error::io(&out, e))?;
        Ok(Self { out })
    }

    pub fn output_dir(&self) -> &Path {
        &self.out
    }

    pub async fn export(&self, pass: &PassOutput) -> Result<ExportCounts> {
        let counts = ExportCounts {
            sessions: self.write_sessions(&pass.users, SessionView::Clean).await?,
            bad_sessions: self.write_sessions(&pass.users, SessionView::WithSuspicious).await?,
            suspicious_queries: self.write_suspicious_queries(&pass.users).await?,
            groups: self.write_groups(&pass.verdicts).await?,
        };
        info!(
            "EXPORT dir={} sessions={} bad_sessions={} suspicious={} groups={}",
            self.out.display(),
            counts.sessions,
            counts.bad_sessions,
            counts.suspicious_queries,
            counts.groups
        );
        Ok(counts)
    }

    pub async fn write_sessions(&self, users: &[User], view: SessionView) -> Result<usize> {
        let mut buf = String::new();
        let mut n = 0;
        for u in users {
            for s in u.sessions_for(view).values() {
                buf += &to_line(&u.session_record(s, view))?;
                n += 1;
            }
        }
        self.write(&sessions_file(view), &buf).await?;
        Ok(n)
    }

    pub async fn write_suspicious_queries(&self, users: &[User]) -> Result<usize> {
        let mut buf = String::new();
        let mut n = 0;
        for q in users.iter().flat_map(|u| u.queries.iter()).filter(|q| q.is_suspicious) {
            buf += &to_line(&QueryRecord::new(q, SessionView::WithSuspicious))?;
            n += 1;
        }
        self.write(SUSPICIOUS_QUERIES_FILE, &buf).await?;
        Ok(n)
    }

    pub async fn write_groups(&self, verdicts: &[GroupVerdict]) -> Result<usize> {
        let mut buf = String::new();
        for v in verdicts {
            buf += &to_line(v)?;
        }
        self.write(GROUPS_FILE, &buf).await?;
        Ok(verdicts.len())
    }

    async fn write(&self, file: &str, content: &str) -> Result<()> {
        let path = self.out.join(file);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        f.write_all(content.as_bytes()).await.map_err(|e| Error::io(&path, e))?;
        f.flush().await.map_err(|e| Error::io(&path, e))?;
        Ok(())
    }
}

fn to_line<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map(|s| s + "\n")
        .map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::engine::pipeline::Pipeline;
    use crate::model::Query;
    use crate::source::MemorySource;
    use crate::workers::literal::RuleKind;

    fn pass() -> PassOutput {
        let mut u = User::new("u1");
        u.push_query(Query::new("search a", 0.0).interactive(true));
        u.push_query(Query::new("| typeahead prefix=s", 50.0).interactive(true));
        u.push_query(Query::new("search b", 7200.0).interactive(true));
        let src = MemorySource::new(vec![u]);
        Pipeline::new(AnalysisConfig::standard(), RuleKind::Literal).run(&src).unwrap()
    }

    #[tokio::test]
    async fn export_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let d = Dispatcher::new(dir.path().join("out")).unwrap();
        let counts = d.export(&pass()).await.unwrap();

        assert_eq!(counts.sessions, 2);
        assert_eq!(counts.bad_sessions, 2);
        assert_eq!(counts.suspicious_queries, 1);

        let sessions = std::fs::read_to_string(d.output_dir().join("sessions.jsonl")).unwrap();
        let first: serde_json::Value = serde_json::from_str(sessions.lines().next().unwrap()).unwrap();
        assert_eq!(first["user"], "u1");
        assert_eq!(first["queries"][0]["text"], "search a");

        let bad = std::fs::read_to_string(d.output_dir().join("bad_sessions.jsonl")).unwrap();
        assert!(bad.contains("typeahead"));
        assert!(!sessions.contains("typeahead"));
        assert!(d.output_dir().join(GROUPS_FILE).exists());
    }

    #[tokio::test]
    async fn repeated_export_appends() {
        let dir = tempfile::tempdir().unwrap();
        let d = Dispatcher::new(dir.path()).unwrap();
        let p = pass();
        d.export(&p).await.unwrap();
        d.export(&p).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join(SUSPICIOUS_QUERIES_FILE)).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
