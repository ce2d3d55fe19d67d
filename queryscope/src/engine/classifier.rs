// queryscope/src/engine/classifier.rs
//
// Statistical layer: turns a group's feature vector into a verdict.
//
// A group is suspicious when ANY of these exceeds its configured maximum:
//   consistency     (default 0.9)    regular repetition
//   clockness       (default 0.9)    aligned to the clock period
//   distinct users  (default 3)      text shared across accounts
//
// Comparisons are strict and thresholds are taken as given, so a negative
// maximum flags everything. Sentinels flow through unchanged: a lone
// interval has consistency 1.0 and is judged on that.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::config::{AnalysisConfig, ClassifierConfig};
use crate::model::{Query, User};
use crate::state::groups::{GroupFeatures, QueryGroup};

#[derive(Debug, Clone, Serialize)]
pub struct GroupVerdict {
    pub group_id: String,
    pub text: String,
    pub user: Option<String>,
    pub suspicious: bool,
    pub features: GroupFeatures,
    pub evidence: Vec<String>,
    /// Selected occurrences the verdict applies to.
    pub queries: Vec<QueryKey>,
}

/// Owner key plus query id. Ids are only unique within one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey {
    pub user: String,
    pub query_id: u64,
}

impl QueryKey {
    pub fn of(q: &Query) -> Self {
        Self { user: q.user.clone(), query_id: q.query_id }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticalClassifier {
    cfg: AnalysisConfig,
}

impl StatisticalClassifier {
    pub fn new(cfg: AnalysisConfig) -> Self {
        Self { cfg }
    }

    pub fn thresholds(&self) -> &ClassifierConfig {
        &self.cfg.classifier
    }

    pub fn judge(&self, group: &QueryGroup) -> GroupVerdict {
        let f = group.features(&self.cfg);
        let t = &self.cfg.classifier;
        let mut evidence = Vec::new();

        if f.consistency > t.consistency_max {
            evidence.push(format!("consistency={:.3}>{}", f.consistency, t.consistency_max));
        }
        if f.clockness > t.clockness_max {
            evidence.push(format!("clockness={:.3}>{}", f.clockness, t.clockness_max));
        }
        if f.distinct_users > t.distinct_users_max {
            evidence.push(format!("distinct_users={}>{}", f.distinct_users, t.distinct_users_max));
        }

        let suspicious = !evidence.is_empty();
        if suspicious {
            debug!(group = %group.id, user = ?group.selected_user, ?evidence, "statistical match");
        }

        GroupVerdict {
            group_id: group.id.clone(),
            text: group.text.clone(),
            user: group.selected_user.clone(),
            suspicious,
            features: f,
            evidence,
            queries: group.selected_occurrences().into_iter().map(QueryKey::of).collect(),
        }
    }

    pub fn is_suspicious(&self, group: &QueryGroup) -> bool {
        self.judge(group).suspicious
    }
}

/// Raise `is_suspicious` on every query covered by a suspicious verdict,
/// matched by owner key and id. Returns how many queries were newly flagged.
pub fn apply_verdicts(users: &mut [User], verdicts: &[GroupVerdict]) -> usize {
    let keys: HashSet<(&str, u64)> = verdicts
        .iter()
        .filter(|v| v.suspicious)
        .flat_map(|v| v.queries.iter().map(|k| (k.user.as_str(), k.query_id)))
        .collect();
    if keys.is_empty() {
        return 0;
    }
    let mut flagged = 0;
    for q in users.iter_mut().flat_map(|u| u.queries.iter_mut()) {
        if !q.is_suspicious && keys.contains(&(q.user.as_str(), q.query_id)) {
            q.is_suspicious = true;
            flagged += 1;
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(user: &str, text: &str, times: &[f64], first_id: u64) -> Vec<Query> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let mut q = Query::new(text, t).interactive(true).with_id(first_id + i as u64);
                q.user = user.to_string();
                q
            })
            .collect()
    }

    // Irregular and off-tick: consistency 0, clockness ~0.71.
    const HUMAN: [f64; 4] = [0.0, 17.0, 500.0, 4000.0];

    fn ids(v: &GroupVerdict) -> Vec<u64> {
        v.queries.iter().map(|k| k.query_id).collect()
    }

    fn classifier() -> StatisticalClassifier {
        StatisticalClassifier::new(AnalysisConfig::standard())
    }

    #[test]
    fn irregular_single_user_is_human() {
        let g = QueryGroup::new("search err", occ("a", "search err", &HUMAN, 1)).for_user("a");
        let v = classifier().judge(&g);
        assert!(!v.suspicious, "{:?}", v);
        assert_eq!(v.features.consistency, 0.0);
        assert!(v.features.clockness < 0.9);
        assert_eq!(ids(&v), vec![1, 2, 3, 4]);
    }

    #[test]
    fn shared_text_flags_even_when_timing_is_irregular() {
        let mut all = occ("a", "search err", &HUMAN, 1);
        for (i, u) in ["b", "c", "d", "e"].iter().enumerate() {
            all.extend(occ(u, "search err", &[9_000.0 + i as f64], 100 + i as u64));
        }
        let g = QueryGroup::new("search err", all).for_user("a");
        let v = classifier().judge(&g);
        assert!(v.suspicious);
        assert_eq!(v.evidence, vec!["distinct_users=5>3".to_string()]);
        // only the selected user's occurrences are implicated
        assert_eq!(ids(&v), vec![1, 2, 3, 4]);
        assert!(v.queries.iter().all(|k| k.user == "a"));
    }

    #[test]
    fn clocked_repetition_flags() {
        let g = QueryGroup::new("| stats count", occ("a", "| stats count", &[0.0, 30.0, 60.0, 90.0, 120.0], 1));
        let v = classifier().judge(&g);
        assert!(v.suspicious);
        assert_eq!(v.evidence.len(), 2);
        assert!(v.evidence[0].starts_with("consistency="));
        assert!(v.evidence[1].starts_with("clockness="));
    }

    #[test]
    fn negative_threshold_flags_everything() {
        let mut cfg = AnalysisConfig::standard();
        cfg.classifier.consistency_max = 2.0;
        cfg.classifier.clockness_max = -2.0;
        let g = QueryGroup::new("x", occ("a", "x", &[1.0], 1));
        // clockness sentinel -1.0 is still above -2.0
        assert!(StatisticalClassifier::new(cfg).is_suspicious(&g));
    }

    #[test]
    fn verdicts_write_back_by_query_id() {
        let mut u = User::new("a");
        for q in occ("a", "x", &[0.0, 30.0, 60.0], 1) {
            u.push_query(q);
        }
        u.push_query(Query::new("y", 5.0).interactive(true).with_id(9));
        let mut users = vec![u];

        let g = QueryGroup::new("x", users[0].queries[..3].to_vec()).for_user("a");
        let verdicts = vec![classifier().judge(&g)];
        assert_eq!(apply_verdicts(&mut users, &verdicts), 3);
        assert_eq!(apply_verdicts(&mut users, &verdicts), 0);
        assert!(!users[0].queries[3].is_suspicious);
    }

    #[test]
    fn same_id_under_another_user_is_left_alone() {
        let mut a = User::new("a");
        for q in occ("a", "| stats count", &[0.0, 30.0, 60.0, 90.0], 1) {
            a.push_query(q);
        }
        let mut b = User::new("b");
        b.push_query(Query::new("search human", 5.0).interactive(true).with_id(1));
        let mut users = vec![a, b];

        let g = QueryGroup::new("| stats count", users[0].queries.clone()).for_user("a");
        let verdicts = vec![classifier().judge(&g)];
        assert!(verdicts[0].suspicious);
        assert_eq!(apply_verdicts(&mut users, &verdicts), 4);
        assert!(users[0].queries.iter().all(|q| q.is_suspicious));
        assert!(!users[1].queries[0].is_suspicious);
    }
}
