// queryscope/src/eval/mod.rs
//
// Corpus-level summaries computed after a pass.
//
//   SuspicionReport       per user: suspicious / interactive, −1 with no
//                         interactive queries; sorted ascending by score
//   InterarrivalSummary   gaps between consecutive non-suspicious interactive
//                         queries of each human user, with a fine histogram of
//                         the short ones
//
// Run:
//   queryscope --mode suspicion     --path logs/
//   queryscope --mode interarrivals --path logs/

pub mod report;

use serde::Serialize;

use crate::model::User;
use crate::workers::literal::SystemAccounts;
use crate::workers::timing;

pub const NO_INTERACTIVE_SCORE: f64 = -1.0;

// ── Suspiciousness ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UserSuspicion {
    pub user: String,
    pub score: f64,
    pub n_interactive: usize,
    pub n_suspicious: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SuspicionReport {
    pub users: Vec<UserSuspicion>,
    pub no_interactive: usize,
    pub only_suspicious: usize,
    pub no_suspicious: usize,
}

impl SuspicionReport {
    pub fn from_users<'a, I>(users: I) -> Self
    where
        I: IntoIterator<Item = &'a User>,
    {
        let mut report = Self::default();
        for u in users {
            let n_interactive = u.interactive_queries().count();
            let n_suspicious = u.interactive_queries().filter(|q| q.is_suspicious).count();
            let score = if n_interactive == 0 {
                report.no_interactive += 1;
                NO_INTERACTIVE_SCORE
            } else {
                n_suspicious as f64 / n_interactive as f64
            };
            if n_interactive > 0 && n_suspicious == 0 {
                report.no_suspicious += 1;
            } else if n_interactive > 0 && n_suspicious == n_interactive {
                report.only_suspicious += 1;
            }
            report.users.push(UserSuspicion { user: u.key(), score, n_interactive, n_suspicious });
        }
        // stable: equal scores keep input order
        report.users.sort_by(|a, b| a.score.total_cmp(&b.score));
        report
    }
}

// ── Interarrivals ─────────────────────────────────────────────────────────────

pub const SHORT_GAP_SECS: f64 = 1.0;
pub const HISTOGRAM_MAX_SECS: f64 = 30.0;
pub const HISTOGRAM_BINS: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct InterarrivalSummary {
    pub total: usize,
    /// Gaps below one second.
    pub under_one_sec: usize,
    /// Gaps left out of the histogram.
    pub over_thirty_secs: usize,
    pub bin_width_secs: f64,
    /// Counts of gaps in [0, 30], equal-width bins, last bin closed.
    pub histogram: Vec<usize>,
}

impl InterarrivalSummary {
    /// System accounts are skipped entirely.
    pub fn from_users<'a, I>(users: I, system: &SystemAccounts) -> Self
    where
        I: IntoIterator<Item = &'a User>,
    {
        let mut gaps = Vec::new();
        for u in users {
            if u.name.as_deref().is_some_and(|n| system.contains(n)) {
                continue;
            }
            let mut times: Vec<f64> = u
                .interactive_queries()
                .filter(|q| !q.is_suspicious)
                .map(|q| q.time)
                .collect();
            times.sort_by(f64::total_cmp);
            gaps.extend(timing::intervals(&times));
        }
        Self::from_gaps(&gaps)
    }

    pub fn from_gaps(gaps: &[f64]) -> Self {
        let width = HISTOGRAM_MAX_SECS / HISTOGRAM_BINS as f64;
        let mut histogram = vec![0usize; HISTOGRAM_BINS];
        let mut over = 0;
        for &g in gaps {
            if g > HISTOGRAM_MAX_SECS {
                over += 1;
                continue;
            }
            let bin = ((g.max(0.0) / width) as usize).min(HISTOGRAM_BINS - 1);
            histogram[bin] += 1;
        }
        Self {
            total: gaps.len(),
            under_one_sec: gaps.iter().filter(|&&g| g < SHORT_GAP_SECS).count(),
            over_thirty_secs: over,
            bin_width_secs: width,
            histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SYSTEM_USER;
    use crate::model::Query;

    fn user(name: &str, qs: &[(f64, bool, bool)]) -> User {
        let mut u = User::new(name);
        for &(t, interactive, suspicious) in qs {
            let mut q = Query::new("q", t).interactive(interactive);
            q.is_suspicious = suspicious;
            u.push_query(q);
        }
        u
    }

    #[test]
    fn scores_and_summary_counts() {
        let users = vec![
            user("half", &[(1.0, true, true), (2.0, true, false)]),
            user("idle", &[(1.0, false, false)]),
            user("bot", &[(1.0, true, true), (2.0, false, false)]),
            user("clean", &[(1.0, true, false)]),
        ];
        let r = SuspicionReport::from_users(&users);

        let order: Vec<(&str, f64)> = r.users.iter().map(|u| (u.user.as_str(), u.score)).collect();
        assert_eq!(order, vec![("idle", -1.0), ("clean", 0.0), ("half", 0.5), ("bot", 1.0)]);
        assert_eq!(r.no_interactive, 1);
        assert_eq!(r.no_suspicious, 1);
        assert_eq!(r.only_suspicious, 1);
        assert_eq!(r.users[3].n_interactive, 1);
    }

    #[test]
    fn interarrivals_skip_suspicious_and_system_accounts() {
        let users = vec![
            user("alice", &[(10.0, true, false), (0.0, true, false), (10.5, true, false), (5.0, true, true), (100.0, true, false)]),
            user(SYSTEM_USER, &[(0.0, true, false), (0.1, true, false)]),
            user("bob", &[(3.0, false, false), (4.0, false, false)]),
        ];
        let s = InterarrivalSummary::from_users(&users, &SystemAccounts::new([SYSTEM_USER]));

        // alice: 0 → 10 → 10.5 → 100
        assert_eq!(s.total, 3);
        assert_eq!(s.under_one_sec, 1);
        assert_eq!(s.over_thirty_secs, 1);
        assert_eq!(s.histogram.iter().sum::<usize>(), 2);
        assert_eq!(s.histogram[0], 1);
        assert_eq!(s.histogram[10], 1);
    }

    #[test]
    fn histogram_edges() {
        let s = InterarrivalSummary::from_gaps(&[0.0, 29.99, 30.0, 30.01]);
        assert_eq!(s.histogram[0], 1);
        assert_eq!(s.histogram[29], 2);
        assert_eq!(s.over_thirty_secs, 1);
        assert_eq!(s.bin_width_secs, 1.0);
    }
}
