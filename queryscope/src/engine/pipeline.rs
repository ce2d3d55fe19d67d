// queryscope/src/engine/pipeline.rs
//
// One full analysis pass over a source:
//
//   source.get_users_with_queries()
//     → literal marking        (chosen RuleKind, per query)
//     → group index            (interactive text × user)
//     → statistical marking    (StatisticalClassifier verdicts, written back)
//     → system-account marking (per user, queries untouched)
//     → sessionize             (clean + with-suspicious views)
//
// Flags are only raised, never cleared, so the order of the two query-level
// layers does not change the final marking. Sessionization runs last so both
// views see every flag.

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::config::AnalysisConfig;
use crate::engine::classifier::{apply_verdicts, GroupVerdict, StatisticalClassifier};
use crate::error::Result;
use crate::model::User;
use crate::source::QuerySource;
use crate::state::groups::GroupIndex;
use crate::workers::literal::{mark_queries, RuleKind, SystemAccounts};
use crate::workers::sessionizer::Sessionizer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub users: usize,
    pub queries: usize,
    pub interactive: usize,
    pub literal_flagged: usize,
    pub statistical_flagged: usize,
    pub groups_judged: usize,
    pub groups_suspicious: usize,
    pub system_accounts: usize,
    pub sessions: usize,
    pub bad_sessions: usize,
}

#[derive(Debug, Clone)]
pub struct PassOutput {
    pub users: Vec<User>,
    pub verdicts: Vec<GroupVerdict>,
    pub stats: PassStats,
}

pub struct Pipeline {
    cfg: AnalysisConfig,
    rule: RuleKind,
    sessionizer: Sessionizer,
    classifier: StatisticalClassifier,
    accounts: SystemAccounts,
}

impl Pipeline {
    pub fn new(cfg: AnalysisConfig, rule: RuleKind) -> Self {
        Self {
            sessionizer: Sessionizer::from_config(&cfg.session),
            classifier: StatisticalClassifier::new(cfg.clone()),
            accounts: SystemAccounts::new(cfg.system_accounts.iter().cloned()),
            rule,
            cfg,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.cfg
    }

    pub fn system_accounts(&self) -> &SystemAccounts {
        &self.accounts
    }

    /// Source errors abort the pass and are returned as-is.
    pub fn run(&self, source: &dyn QuerySource) -> Result<PassOutput> {
        let span = info_span!("pass", rule = self.rule.rule().name());
        let _g = span.enter();

        let mut users = source.get_users_with_queries()?.collect::<Result<Vec<User>>>()?;
        let mut stats = PassStats {
            users: users.len(),
            queries: users.iter().map(|u| u.queries.len()).sum(),
            interactive: users.iter().map(|u| u.interactive_queries().count()).sum(),
            ..PassStats::default()
        };
        info!(users = stats.users, queries = stats.queries, interactive = stats.interactive, "loaded");

        let rule = self.rule.rule();
        stats.literal_flagged = users.iter_mut().map(|u| mark_queries(u, rule)).sum();

        let verdicts = {
            let index = GroupIndex::from_queries(users.iter().flat_map(|u| u.queries.iter()));
            index
                .per_user_groups(self.cfg.classifier.min_occurrences)
                .iter()
                .map(|g| self.classifier.judge(g))
                .collect::<Vec<_>>()
        };
        stats.groups_judged = verdicts.len();
        stats.groups_suspicious = verdicts.iter().filter(|v| v.suspicious).count();
        stats.statistical_flagged = apply_verdicts(&mut users, &verdicts);

        for u in users.iter_mut() {
            if self.accounts.mark_user(u) {
                stats.system_accounts += 1;
            }
        }

        for u in users.iter_mut() {
            let span = info_span!("sessionize", user = %u.key());
            let _g = span.enter();
            self.sessionizer.sessionize(u);
            stats.sessions += u.sessions.len();
            stats.bad_sessions += u.bad_sessions.len();
            debug!(sessions = u.sessions.len(), bad_sessions = u.bad_sessions.len(), "user done");
        }

        info!(
            literal = stats.literal_flagged,
            statistical = stats.statistical_flagged,
            system_accounts = stats.system_accounts,
            sessions = stats.sessions,
            bad_sessions = stats.bad_sessions,
            "pass complete"
        );
        Ok(PassOutput { users, verdicts, stats })
    }
}
