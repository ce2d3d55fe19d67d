// queryscope/src/model.rs
//
// Normalized data model shared by every stage: users, their queries, and the
// sessions reconstructed from them.
//
// Ownership layout:
//   User    owns   Vec<Query>            (source order, never reordered)
//   Session holds  indices into that Vec (chronological after sessionization)
//   Query   holds  the owning user's identity key + one SessionRef per view
//
// Back-references are plain keys/indices rather than pointers, so a User can
// be moved, cloned, and serialized freely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `user_type` marker applied to known system/service accounts.
pub const USER_TYPE_SUSPICIOUS: &str = "suspicious";

// ── Session views ─────────────────────────────────────────────────────────────

/// The two parallel session numbering schemes a user carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionView {
    /// Interactive queries with classifier-suspicious ones removed.
    /// Stored in `User::sessions`.
    Clean,
    /// Every interactive query, suspicious ones included ("bad sessions").
    /// Stored in `User::bad_sessions`.
    WithSuspicious,
}

impl std::fmt::Display for SessionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "sessions"),
            Self::WithSuspicious => write!(f, "bad_sessions"),
        }
    }
}

/// Placement of a query inside one session view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionRef {
    pub id: usize,
    /// Seconds since the user's preceding query in this view, which for a
    /// session's first query is the gap that opened it (0 for the first
    /// query of a user's timeline).
    pub delta: f64,
}

// ── Query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query_id: u64,
    pub text: String,
    /// Posix seconds. Sole ordering key.
    pub time: f64,
    /// Effective identity key of the owning user (see `User::key`).
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub is_interactive: bool,
    #[serde(default)]
    pub is_suspicious: bool,
    pub execution_time: Option<f64>,
    pub earliest_event: Option<f64>,
    pub latest_event: Option<f64>,
    pub range: Option<f64>,
    pub is_realtime: Option<bool>,
    pub search_type: Option<String>,
    pub search_id: Option<String>,
    pub saved_search_name: Option<String>,
    #[serde(skip)]
    pub session: Option<SessionRef>,
    #[serde(skip)]
    pub bad_session: Option<SessionRef>,
}

impl Query {
    pub fn new(text: impl Into<String>, time: f64) -> Self {
        Self {
            query_id: 0,
            text: text.into(),
            time,
            user: String::new(),
            is_interactive: false,
            is_suspicious: false,
            execution_time: None,
            earliest_event: None,
            latest_event: None,
            range: None,
            is_realtime: None,
            search_type: None,
            search_id: None,
            saved_search_name: None,
            session: None,
            bad_session: None,
        }
    }

    pub fn with_id(mut self, query_id: u64) -> Self {
        self.query_id = query_id;
        self
    }

    pub fn interactive(mut self, yes: bool) -> Self {
        self.is_interactive = yes;
        self
    }

    pub fn with_search_type(mut self, search_type: impl Into<String>) -> Self {
        self.search_type = Some(search_type.into());
        self
    }

    pub fn session_ref(&self, view: SessionView) -> Option<SessionRef> {
        match view {
            SessionView::Clean => self.session,
            SessionView::WithSuspicious => self.bad_session,
        }
    }

    pub(crate) fn set_session_ref(&mut self, view: SessionView, r: Option<SessionRef>) {
        match view {
            SessionView::Clean => self.session = r,
            SessionView::WithSuspicious => self.bad_session = r,
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 0-based, chronological within a user and a view.
    pub id: usize,
    pub user: String,
    /// Indices into the owning user's `queries`, ascending by time.
    pub queries: Vec<usize>,
    /// last.time − first.time; `None` until the session is closed.
    pub duration: Option<f64>,
    pub session_type: Option<String>,
}

impl Session {
    pub fn new(id: usize, user: impl Into<String>) -> Self {
        Self { id, user: user.into(), queries: Vec::new(), duration: None, session_type: None }
    }

    pub fn len(&self) -> usize { self.queries.len() }
    pub fn is_empty(&self) -> bool { self.queries.is_empty() }
    pub fn is_closed(&self) -> bool { self.duration.is_some() }

    pub(crate) fn close(&mut self, queries: &[Query]) {
        if let (Some(&first), Some(&last)) = (self.queries.first(), self.queries.last()) {
            self.duration = Some(queries[last].time - queries[first].time);
        }
    }
}

// ── User ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub name: Option<String>,
    /// Groups several log exports of one investigation.
    pub case_id: Option<String>,
    pub user_type: Option<String>,
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub sessions: BTreeMap<usize, Session>,
    #[serde(default)]
    pub bad_sessions: BTreeMap<usize, Session>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        let key = self.key();
        for q in &mut self.queries {
            q.user = key.clone();
        }
        self
    }

    /// Effective identity key: `name.case_id` when a case is present.
    pub fn key(&self) -> String {
        user_key(self.name.as_deref(), self.case_id.as_deref())
    }

    /// Append a query, stamping it with this user's identity key.
    pub fn push_query(&mut self, mut query: Query) {
        query.user = self.key();
        self.queries.push(query);
    }

    pub fn interactive_queries(&self) -> impl Iterator<Item = &Query> {
        self.queries.iter().filter(|q| q.is_interactive)
    }

    pub fn noninteractive_queries(&self) -> impl Iterator<Item = &Query> {
        self.queries.iter().filter(|q| !q.is_interactive)
    }

    /// A copy carrying identity and classification only.
    pub fn without_queries(&self) -> Self {
        Self {
            name: self.name.clone(),
            case_id: self.case_id.clone(),
            user_type: self.user_type.clone(),
            ..Self::default()
        }
    }

    pub fn is_suspicious(&self) -> bool {
        self.user_type.as_deref() == Some(USER_TYPE_SUSPICIOUS)
    }

    pub fn sessions_for(&self, view: SessionView) -> &BTreeMap<usize, Session> {
        match view {
            SessionView::Clean => &self.sessions,
            SessionView::WithSuspicious => &self.bad_sessions,
        }
    }

    pub(crate) fn sessions_for_mut(&mut self, view: SessionView) -> &mut BTreeMap<usize, Session> {
        match view {
            SessionView::Clean => &mut self.sessions,
            SessionView::WithSuspicious => &mut self.bad_sessions,
        }
    }

    pub fn session_queries<'a>(&'a self, session: &'a Session) -> impl Iterator<Item = &'a Query> + 'a {
        session.queries.iter().map(move |&i| &self.queries[i])
    }

    pub fn session_record<'a>(&'a self, session: &'a Session, view: SessionView) -> SessionRecord<'a> {
        SessionRecord {
            id: session.id,
            user: &session.user,
            view,
            duration: session.duration,
            session_type: session.session_type.as_deref(),
            queries: self.session_queries(session).map(|q| QueryRecord::new(q, view)).collect(),
        }
    }
}

pub fn user_key(name: Option<&str>, case_id: Option<&str>) -> String {
    let name = name.unwrap_or("");
    match case_id {
        Some(case) => format!("{}.{}", name, case),
        None => name.to_string(),
    }
}

// ── Encoders ──────────────────────────────────────────────────────────────────
// Flat JSON shapes for reporting. Sessions always carry id, user and the
// ordered queries with time and text.

#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord<'a> {
    pub query_id: u64,
    pub time: f64,
    pub text: &'a str,
    pub user: &'a str,
    pub is_interactive: bool,
    pub is_suspicious: bool,
    pub session: Option<usize>,
    pub delta: Option<f64>,
}

impl<'a> QueryRecord<'a> {
    pub fn new(query: &'a Query, view: SessionView) -> Self {
        let r = query.session_ref(view);
        Self {
            query_id: query.query_id,
            time: query.time,
            text: &query.text,
            user: &query.user,
            is_interactive: query.is_interactive,
            is_suspicious: query.is_suspicious,
            session: r.map(|r| r.id),
            delta: r.map(|r| r.delta),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord<'a> {
    pub id: usize,
    pub user: &'a str,
    pub view: SessionView,
    pub duration: Option<f64>,
    pub session_type: Option<&'a str>,
    pub queries: Vec<QueryRecord<'a>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_includes_case() {
        assert_eq!(User::new("alice").key(), "alice");
        assert_eq!(User::new("alice").with_case("7").key(), "alice.7");
        assert_eq!(User::default().key(), "");
        assert_eq!(user_key(None, Some("3")), ".3");
    }

    #[test]
    fn push_query_stamps_owner() {
        let mut u = User::new("bob").with_case("c1");
        u.push_query(Query::new("search error", 10.0).interactive(true));
        u.push_query(Query::new("| stats count", 20.0));
        assert!(u.queries.iter().all(|q| q.user == "bob.c1"));
        assert_eq!(u.interactive_queries().count(), 1);
        assert_eq!(u.noninteractive_queries().count(), 1);
    }

    #[test]
    fn with_case_restamps_existing_queries() {
        let mut u = User::new("bob");
        u.push_query(Query::new("x", 1.0));
        let u = u.with_case("9");
        assert_eq!(u.queries[0].user, "bob.9");
    }

    #[test]
    fn session_record_serializes_ordered_queries() {
        let mut u = User::new("carol");
        u.push_query(Query::new("a", 5.0).interactive(true));
        u.push_query(Query::new("b", 9.0).interactive(true));
        let mut s = Session::new(0, u.key());
        s.queries = vec![0, 1];
        s.close(&u.queries);
        assert_eq!(s.duration, Some(4.0));

        let json = serde_json::to_value(u.session_record(&s, SessionView::Clean)).unwrap();
        assert_eq!(json["id"], 0);
        assert_eq!(json["user"], "carol");
        assert_eq!(json["queries"][0]["text"], "a");
        assert_eq!(json["queries"][1]["time"], 9.0);
    }

    #[test]
    fn without_queries_keeps_identity() {
        let mut u = User::new("dave").with_case("x");
        u.user_type = Some(USER_TYPE_SUSPICIOUS.into());
        u.push_query(Query::new("q", 1.0));
        let bare = u.without_queries();
        assert!(bare.queries.is_empty());
        assert_eq!(bare.key(), "dave.x");
        assert!(bare.is_suspicious());
    }
}
