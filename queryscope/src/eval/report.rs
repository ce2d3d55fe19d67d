// queryscope/src/eval/report.rs
//
// Terminal renderings: session listings, plus markdown and JSON for the eval
// summaries.

use std::fmt::Write as _;

use super::{InterarrivalSummary, SuspicionReport};
use crate::model::{SessionView, User};

/// Plain listing: a `session_id user` header, then `time text` per query,
/// blank line between sessions.
pub fn sessions_text(users: &[User], view: SessionView) -> String {
    let mut out = String::new();
    for u in users {
        for s in u.sessions_for(view).values() {
            let _ = writeln!(out, "{} {}", s.id, s.user);
            for q in u.session_queries(s) {
                let _ = writeln!(out, "{} {}", q.time, q.text);
            }
            let _ = writeln!(out);
        }
    }
    out
}

pub fn suspicion_markdown(report: &SuspicionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Query Suspiciousness Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "| User | Score | Interactive | Suspicious |");
    let _ = writeln!(out, "|------|-------|-------------|------------|");
    for u in &report.users {
        let _ = writeln!(
            out,
            "| {} | {:.4} | {} | {} |",
            u.user, u.score, u.n_interactive, u.n_suspicious
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "**Users with no interactive queries**: {}", report.no_interactive);
    let _ = writeln!(out, "**Users with only suspicious queries**: {}", report.only_suspicious);
    let _ = writeln!(out, "**Users with no suspicious queries**: {}", report.no_suspicious);
    out
}

pub fn interarrival_markdown(summary: &InterarrivalSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Interarrival Summary");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Intervals**: {}  **Under 1s**: {}  **Over 30s**: {}",
        summary.total, summary.under_one_sec, summary.over_thirty_secs
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "| Gap (s) | Count |");
    let _ = writeln!(out, "|---------|-------|");
    for (i, n) in summary.histogram.iter().enumerate() {
        let lo = i as f64 * summary.bin_width_secs;
        let _ = writeln!(out, "| {:>5.1}-{:<5.1} | {} |", lo, lo + summary.bin_width_secs, n);
    }
    out
}

pub fn suspicion_json(report: &SuspicionReport) -> String {
    serde_json::json!({
        "users":           report.users,
        "no_interactive":  report.no_interactive,
        "only_suspicious": report.only_suspicious,
        "no_suspicious":   report.no_suspicious,
    })
    .to_string()
}

pub fn interarrival_json(summary: &InterarrivalSummary) -> String {
    serde_json::json!({
        "total":            summary.total,
        "under_one_sec":    summary.under_one_sec,
        "over_thirty_secs": summary.over_thirty_secs,
        "bin_width_secs":   summary.bin_width_secs,
        "histogram":        summary.histogram,
    })
    .to_string()
}
