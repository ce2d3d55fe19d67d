// queryscope/src/workers/literal.rs
//
// Literal suspicious-query rules. No statistical context: one query text in,
// one verdict out.
//
// Two independent rule sets exist and are deliberately NOT merged:
//
//   LiteralRules    normalized text (trimmed, lower-cased, all whitespace
//                   removed) equals a known platform housekeeping search, starts
//                   with an autocompletion prefix, or contains a known
//                   housekeeping fragment (Aho-Corasick, over-inclusive).
//   TypeaheadRule   raw text contains "typeahead". Used for bulk-marking a
//                   stored corpus.
//
// Callers pick one per pass via `RuleKind`.
//
// A third, coarser rule classifies whole accounts: `SystemAccounts` marks a
// user whose name is on the service-account list. It never touches the
// user's individual queries.

use std::collections::HashSet;
use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{User, USER_TYPE_SUSPICIOUS};

// Normalized (whitespace-free, lower-case) forms are derived at first use.
const EXACT_SEARCHES: &[(&str, &str)] = &[
    ("| metadata type=sourcetypes | search totalcount > 0", "metadata_sourcetypes"),
    (
        "|history | head 2000 | search event_count>0 or result_count>0 | dedup search | table search",
        "history_replay",
    ),
    ("| inputlookup splunk_servers_cache | sort sort_rank", "servers_cache_lookup"),
];

const AUTOCOMPLETE_PREFIXES: &[&str] = &["typeaheadprefix", "|typeaheadprefix"];

const CONTAINED_FRAGMENTS: &[(&str, &str)] = &[
    ("| metadata type=sourcetypes | search totalcount > 0", "metadata_sourcetypes_fragment"),
];

pub const TYPEAHEAD_MARKER: &str = "typeahead";

static EXACT: OnceLock<Vec<(String, &'static str)>> = OnceLock::new();
static FRAGMENT_AC: OnceLock<(AhoCorasick, Vec<&'static str>)> = OnceLock::new();

/// Trim, lower-case, and drop every whitespace character.
pub fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn exact_searches() -> &'static [(String, &'static str)] {
    EXACT.get_or_init(|| EXACT_SEARCHES.iter().map(|(s, l)| (normalize(s), *l)).collect())
}

fn fragment_automaton() -> &'static (AhoCorasick, Vec<&'static str>) {
    FRAGMENT_AC.get_or_init(|| {
        let patterns: Vec<String> = CONTAINED_FRAGMENTS.iter().map(|(p, _)| normalize(p)).collect();
        let labels: Vec<&str> = CONTAINED_FRAGMENTS.iter().map(|(_, l)| *l).collect();
        let ac = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&patterns)
            .expect("fragment AC build failed");
        (ac, labels)
    })
}

// ── Rules ─────────────────────────────────────────────────────────────────────

pub trait QueryRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Label of the matching pattern, or None when the text looks human.
    fn classify(&self, text: &str) -> Option<&'static str>;

    fn is_suspicious(&self, text: &str) -> bool {
        self.classify(text).is_some()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralRules;

impl QueryRule for LiteralRules {
    fn name(&self) -> &'static str { "literal" }

    fn classify(&self, text: &str) -> Option<&'static str> {
        let q = normalize(text);
        if let Some((_, label)) = exact_searches().iter().find(|(s, _)| *s == q) {
            return Some(*label);
        }
        if AUTOCOMPLETE_PREFIXES.iter().any(|p| q.starts_with(p)) {
            return Some("autocomplete_prefix");
        }
        let (ac, labels) = fragment_automaton();
        ac.find(&q).map(|m| labels[m.pattern().as_usize()])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypeaheadRule;

impl QueryRule for TypeaheadRule {
    fn name(&self) -> &'static str { "typeahead" }

    fn classify(&self, text: &str) -> Option<&'static str> {
        text.contains(TYPEAHEAD_MARKER).then_some("typeahead")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    Literal,
    Typeahead,
}

impl RuleKind {
    pub fn rule(self) -> &'static dyn QueryRule {
        match self {
            Self::Literal => &LiteralRules,
            Self::Typeahead => &TypeaheadRule,
        }
    }
}

/// Flag every matching query of `user`. Flags are only ever raised here.
/// Returns how many queries were newly flagged.
pub fn mark_queries(user: &mut User, rule: &dyn QueryRule) -> usize {
    let mut flagged = 0;
    for q in user.queries.iter_mut().filter(|q| !q.is_suspicious) {
        if let Some(label) = rule.classify(&q.text) {
            q.is_suspicious = true;
            flagged += 1;
            debug!(rule = rule.name(), label, query_id = q.query_id, "literal match");
        }
    }
    flagged
}

// ── Account-level rule ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SystemAccounts {
    names: HashSet<String>,
}

impl SystemAccounts {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Exact name match (case id ignored). Queries are left untouched.
    pub fn mark_user(&self, user: &mut User) -> bool {
        let hit = user.name.as_deref().map(|n| self.contains(n)).unwrap_or(false);
        if hit {
            user.user_type = Some(USER_TYPE_SUSPICIOUS.to_string());
        }
        hit
    }
}
