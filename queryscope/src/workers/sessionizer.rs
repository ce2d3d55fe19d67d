// queryscope/src/workers/sessionizer.rs
//
// Inactivity-gap sessionization.
//
// A user's interactive queries are sorted by time (stable; ties keep source
// order) and cut wherever the gap to the previous query is strictly greater
// than the inactivity threshold. The first query never opens a session on its
// own: its delta is 0.
//
//   t:     0    100            7200   7300
//   delta: 0    100            7100    100
//          └─ session 0 ─┘     └─ session 1 ─┘     (threshold 1800s)
//
// Two views are produced by the same cut over different inputs:
//   Clean            suspicious queries removed  → User::sessions
//   WithSuspicious   every interactive query     → User::bad_sessions
//
// Needs the user's full interactive timeline; nothing here is incremental.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{SessionConfig, DEFAULT_SESSION_THRESHOLD_SECS};
use crate::model::{Query, Session, SessionRef, SessionView, User};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sessionizer {
    threshold_secs: f64,
}

impl Default for Sessionizer {
    fn default() -> Self {
        Self { threshold_secs: DEFAULT_SESSION_THRESHOLD_SECS }
    }
}

impl Sessionizer {
    pub fn new(threshold_secs: f64) -> Self {
        Self { threshold_secs }
    }

    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self::new(cfg.inactivity_threshold_secs)
    }

    pub fn threshold_secs(&self) -> f64 {
        self.threshold_secs
    }

    /// Rebuild both session views for `user`.
    pub fn sessionize(&self, user: &mut User) {
        self.sessionize_view(user, SessionView::Clean);
        self.sessionize_view(user, SessionView::WithSuspicious);
    }

    /// Rebuild one session view, replacing any previous numbering for it.
    /// Queries outside the view get their reference for that view cleared.
    pub fn sessionize_view(&self, user: &mut User, view: SessionView) {
        let key = user.key();
        for q in &mut user.queries {
            q.set_session_ref(view, None);
        }

        let order = timeline(&user.queries, view);
        let cuts = self.cut(&user.queries, &order);
        let mut sessions = BTreeMap::new();

        for (id, (members, deltas)) in cuts.into_iter().enumerate() {
            let mut session = Session::new(id, key.clone());
            for (&idx, &delta) in members.iter().zip(deltas.iter()) {
                user.queries[idx].set_session_ref(view, Some(SessionRef { id, delta }));
            }
            session.queries = members;
            session.close(&user.queries);
            sessions.insert(id, session);
        }

        debug!(user = %key, view = %view, n_sessions = sessions.len(), "sessionized");
        *user.sessions_for_mut(view) = sessions;
    }

    /// Split an already time-ordered list of query indices into sessions.
    /// Returns (member indices, per-member delta) for each session.
    fn cut(&self, queries: &[Query], order: &[usize]) -> Vec<(Vec<usize>, Vec<f64>)> {
        let mut out: Vec<(Vec<usize>, Vec<f64>)> = Vec::new();
        let mut prev_time: Option<f64> = None;

        for &idx in order {
            let time = queries[idx].time;
            let delta = prev_time.map(|p| time - p).unwrap_or(0.0);
            if out.is_empty() || delta > self.threshold_secs {
                out.push((Vec::new(), Vec::new()));
            }
            if let Some((members, deltas)) = out.last_mut() {
                members.push(idx);
                deltas.push(delta);
            }
            prev_time = Some(time);
        }
        out
    }
}

/// Indices of the view's queries, stably sorted by time.
fn timeline(queries: &[Query], view: SessionView) -> Vec<usize> {
    let mut order: Vec<usize> = queries
        .iter()
        .enumerate()
        .filter(|(_, q)| q.is_interactive)
        .filter(|(_, q)| view == SessionView::WithSuspicious || !q.is_suspicious)
        .map(|(i, _)| i)
        .collect();
    order.sort_by(|&a, &b| queries[a].time.total_cmp(&queries[b].time));
    order
}
