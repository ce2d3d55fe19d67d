// queryscope/src/state/groups.rs
//
// Query groups: every occurrence of one exact query text, optionally narrowed
// to one user. The group is the unit the statistical classifier judges.
//
//   text ──► all_occurrences (every user)    → distinct-user count
//        └─► selected_occurrences (one user) → interarrival timing features
//
// Two ways to build groups:
//   GroupIndex::from_queries    bucket an in-hand corpus by text
//   GroupIndex::from_source     pull one text at a time from a QuerySource,
//                               never holding more than the current group

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span};

use crate::config::{AnalysisConfig, EntropyConfig, TimingConfig};
use crate::error::Result;
use crate::model::Query;
use crate::source::{Interactivity, QuerySource};
use crate::workers::timing;

/// Short stable id for a query text: first 8 bytes of SHA-256, hex.
pub fn text_id(text: &str) -> String {
    let mut h = Sha256::new();
    h.update(text.as_bytes());
    hex::encode(&h.finalize()[..8])
}

// ── QueryGroup ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct QueryGroup {
    pub id: String,
    pub text: String,
    /// Identity key whose occurrences drive the timing features. `None`
    /// means every occurrence counts.
    pub selected_user: Option<String>,
    pub all_occurrences: Vec<Query>,
    interarrivals: OnceCell<Vec<f64>>,
}

impl QueryGroup {
    pub fn new(text: impl Into<String>, occurrences: Vec<Query>) -> Self {
        let text = text.into();
        Self {
            id: text_id(&text),
            text,
            selected_user: None,
            all_occurrences: occurrences,
            interarrivals: OnceCell::new(),
        }
    }

    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.selected_user = Some(user.into());
        self.interarrivals = OnceCell::new();
        self
    }

    /// The selected user's occurrences, ascending by time (stable).
    pub fn selected_occurrences(&self) -> Vec<&Query> {
        let mut out: Vec<&Query> = self
            .all_occurrences
            .iter()
            .filter(|q| self.selected_user.as_deref().map_or(true, |u| q.user == u))
            .collect();
        out.sort_by(|a, b| a.time.total_cmp(&b.time));
        out
    }

    /// Consecutive gaps between the selected occurrences. Computed once.
    pub fn interarrival_intervals(&self) -> &[f64] {
        self.interarrivals.get_or_init(|| {
            let times: Vec<f64> = self.selected_occurrences().iter().map(|q| q.time).collect();
            timing::intervals(&times)
        })
    }

    pub fn interarrival_entropy(&self) -> f64 {
        self.interarrival_entropy_with(&EntropyConfig::default())
    }

    pub fn interarrival_entropy_with(&self, cfg: &EntropyConfig) -> f64 {
        timing::entropy(self.interarrival_intervals(), cfg)
    }

    pub fn interarrival_consistency(&self) -> f64 {
        self.interarrival_consistency_with(&TimingConfig::default())
    }

    pub fn interarrival_consistency_with(&self, cfg: &TimingConfig) -> f64 {
        timing::consistency(self.interarrival_intervals(), cfg)
    }

    pub fn interarrival_clockness(&self) -> f64 {
        self.interarrival_clockness_with(&TimingConfig::default())
    }

    pub fn interarrival_clockness_with(&self, cfg: &TimingConfig) -> f64 {
        timing::clockness(self.interarrival_intervals(), cfg)
    }

    /// Distinct users across every occurrence, not only the selected user's.
    pub fn number_of_distinct_users(&self) -> usize {
        self.all_occurrences.iter().map(|q| q.user.as_str()).collect::<HashSet<_>>().len()
    }

    pub fn features(&self, cfg: &AnalysisConfig) -> GroupFeatures {
        GroupFeatures {
            occurrences: self.selected_occurrences().len(),
            intervals: self.interarrival_intervals().len(),
            entropy: self.interarrival_entropy_with(&cfg.entropy),
            consistency: self.interarrival_consistency_with(&cfg.timing),
            clockness: self.interarrival_clockness_with(&cfg.timing),
            distinct_users: self.number_of_distinct_users(),
        }
    }
}

/// Statistical feature vector of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupFeatures {
    pub occurrences: usize,
    pub intervals: usize,
    pub entropy: f64,
    pub consistency: f64,
    pub clockness: f64,
    pub distinct_users: usize,
}

// ── GroupIndex ────────────────────────────────────────────────────────────────

/// Interactive occurrences bucketed by exact text, texts in sorted order.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    by_text: BTreeMap<String, Vec<Query>>,
}

impl GroupIndex {
    /// Non-interactive queries are ignored.
    pub fn from_queries<'a, I>(queries: I) -> Self
    where
        I: IntoIterator<Item = &'a Query>,
    {
        let mut by_text: BTreeMap<String, Vec<Query>> = BTreeMap::new();
        for q in queries.into_iter().filter(|q| q.is_interactive) {
            by_text.entry(q.text.clone()).or_default().push(q.clone());
        }
        debug!(texts = by_text.len(), "group index built");
        Self { by_text }
    }

    pub fn len(&self) -> usize { self.by_text.len() }
    pub fn is_empty(&self) -> bool { self.by_text.is_empty() }

    /// One group per text. `multiple` drops texts seen only once.
    pub fn groups(&self, multiple: bool) -> Vec<QueryGroup> {
        self.by_text
            .iter()
            .filter(|(_, occ)| !multiple || occ.len() > 1)
            .map(|(text, occ)| QueryGroup::new(text.clone(), occ.clone()))
            .collect()
    }

    /// Groups narrowed to `user`. `multiple` drops texts the user issued
    /// only once; the other users' occurrences are always kept.
    pub fn groups_for_user(&self, user: &str, multiple: bool) -> Vec<QueryGroup> {
        self.by_text
            .iter()
            .filter_map(|(text, occ)| {
                let mine = occ.iter().filter(|q| q.user == user).count();
                let keep = if multiple { mine > 1 } else { mine > 0 };
                keep.then(|| QueryGroup::new(text.clone(), occ.clone()).for_user(user))
            })
            .collect()
    }

    /// Every (text, user) pair with at least `min_occurrences` copies by
    /// that user, ordered by text then user.
    pub fn per_user_groups(&self, min_occurrences: usize) -> Vec<QueryGroup> {
        let mut out = Vec::new();
        for (text, occ) in &self.by_text {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for q in occ {
                *counts.entry(q.user.as_str()).or_default() += 1;
            }
            for (user, n) in counts {
                if n >= min_occurrences.max(1) {
                    out.push(QueryGroup::new(text.clone(), occ.clone()).for_user(user));
                }
            }
        }
        out
    }

    /// Build groups by pulling texts from `source` one at a time. Stops after
    /// `limit` groups when set. Source errors end the scan.
    pub fn from_source(
        source: &dyn QuerySource,
        multiple: bool,
        limit: Option<usize>,
    ) -> Result<Vec<QueryGroup>> {
        let span = info_span!("group_scan", multiple);
        let _g = span.enter();

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for q in source.get_queries(Interactivity::Interactive)? {
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
            let q = q?;
            if !seen.insert(q.text.clone()) {
                continue;
            }
            let copies = source
                .get_interactive_queries_with_text(&q.text)?
                .collect::<Result<Vec<Query>>>()?;
            if multiple && copies.len() <= 1 {
                continue;
            }
            out.push(QueryGroup::new(q.text, copies));
            if out.len() % 10 == 0 {
                debug!(groups = out.len(), "group scan progress");
            }
        }

        info!(groups = out.len(), texts = seen.len(), "group scan complete");
        Ok(out)
    }
}
