// queryscope/src/source/memory.rs
//
// In-memory source. Restartable: every call iterates the same owned users.

use std::collections::HashSet;

use tracing::debug;

use super::{Interactivity, QuerySource, Stream};
use crate::error::Result;
use crate::model::{Query, User};

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    users: Vec<User>,
}

impl MemorySource {
    /// Queries are restamped with their owner's key. Ids that are unset (0)
    /// or repeat within one user are replaced with fresh sequential ids.
    pub fn new(users: Vec<User>) -> Self {
        let mut next_id = users
            .iter()
            .flat_map(|u| u.queries.iter().map(|q| q.query_id))
            .max()
            .unwrap_or(0);
        let users = users
            .into_iter()
            .map(|mut u| {
                let key = u.key();
                let mut seen = HashSet::new();
                for q in &mut u.queries {
                    q.user = key.clone();
                    if q.query_id == 0 || !seen.insert(q.query_id) {
                        next_id += 1;
                        q.query_id = next_id;
                        seen.insert(next_id);
                    }
                }
                u
            })
            .collect::<Vec<_>>();
        debug!("Memory source holds {} users", users.len());
        Self { users }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }
}

impl QuerySource for MemorySource {
    fn get_users(&self) -> Result<Stream<'_, User>> {
        Ok(Box::new(self.users.iter().map(|u| Ok(u.without_queries()))))
    }

    fn get_queries(&self, filter: Interactivity) -> Result<Stream<'_, Query>> {
        Ok(Box::new(
            self.users
                .iter()
                .flat_map(|u| u.queries.iter())
                .filter(move |q| filter.admits(q))
                .map(|q| Ok(q.clone())),
        ))
    }

    fn get_users_with_queries(&self) -> Result<Stream<'_, User>> {
        Ok(Box::new(self.users.iter().map(|u| Ok(u.clone()))))
    }

    fn is_restartable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        let mut a = User::new("a");
        a.push_query(Query::new("x", 1.0).interactive(true));
        a.push_query(Query::new("y", 2.0));
        let mut b = User::new("b").with_case("k");
        b.push_query(Query::new("x", 3.0).interactive(true));
        MemorySource::new(vec![a, b])
    }

    #[test]
    fn assigns_ids_and_keys() {
        let src = source();
        let ids: Vec<u64> = src.users().iter().flat_map(|u| u.queries.iter().map(|q| q.query_id)).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(src.users()[1].queries[0].user, "b.k");
    }

    #[test]
    fn repeated_ids_within_a_user_are_replaced() {
        let mut a = User::new("a");
        a.push_query(Query::new("x", 1.0).with_id(7));
        a.push_query(Query::new("y", 2.0).with_id(7));
        let mut b = User::new("b");
        b.push_query(Query::new("z", 3.0).with_id(7));
        let src = MemorySource::new(vec![a, b]);

        let ids: Vec<u64> = src.users()[0].queries.iter().map(|q| q.query_id).collect();
        assert_eq!(ids, vec![7, 8]);
        // same id under another owner is a different query
        assert_eq!(src.users()[1].queries[0].query_id, 7);
    }

    #[test]
    fn users_come_back_without_queries() {
        let src = source();
        let users: Vec<User> = src.get_users().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.queries.is_empty()));
    }

    #[test]
    fn query_filters_and_text_lookup() {
        let src = source();
        assert_eq!(src.get_queries(Interactivity::Any).unwrap().count(), 3);
        assert_eq!(src.get_queries(Interactivity::Interactive).unwrap().count(), 2);
        assert_eq!(src.get_queries(Interactivity::Scheduled).unwrap().count(), 1);
        let same: Vec<Query> = src.get_interactive_queries_with_text("x").unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(same.len(), 2);
        assert!(src.get_interactive_queries_with_text("y").unwrap().next().is_none());
    }

    #[test]
    fn restartable() {
        let src = source();
        assert!(src.is_restartable());
        let first = src.get_users_with_queries().unwrap().count();
        let second = src.get_users_with_queries().unwrap().count();
        assert_eq!(first, second);
    }
}
