// queryscope/src/source/mod.rs
//
// Query source capability. Everything downstream (sessionizer, group
// analyzer, pipeline) talks to this trait only, never to a concrete backend.
//
// Streams are lazy, finite and forward-only. Whether calling a method twice
// replays the same data is backend-specific (`is_restartable`); callers must
// treat every returned stream as single-pass and call the method again
// instead of cloning or rewinding.

pub mod jsonl;
pub mod memory;
pub mod version;

use crate::error::Result;
use crate::model::{Query, User};

pub use jsonl::JsonFileSource;
pub use memory::MemorySource;
pub use version::DataVersion;

/// Boxed lazy sequence. Items carry adapter errors unmodified.
pub type Stream<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Tri-state filter for `get_queries`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interactivity {
    #[default]
    Any,
    Interactive,
    Scheduled,
}

impl Interactivity {
    pub fn admits(self, query: &Query) -> bool {
        match self {
            Self::Any => true,
            Self::Interactive => query.is_interactive,
            Self::Scheduled => !query.is_interactive,
        }
    }
}

impl From<Option<bool>> for Interactivity {
    fn from(v: Option<bool>) -> Self {
        match v {
            None => Self::Any,
            Some(true) => Self::Interactive,
            Some(false) => Self::Scheduled,
        }
    }
}

/// Adapters must keep `query_id` unique within each user; the same id under
/// two users names two different queries.
pub trait QuerySource {
    /// Users without their queries.
    fn get_users(&self) -> Result<Stream<'_, User>>;

    /// Queries, optionally restricted to interactive or scheduled ones.
    fn get_queries(&self, filter: Interactivity) -> Result<Stream<'_, Query>>;

    /// Users with `queries` populated and `is_interactive` set on each.
    fn get_users_with_queries(&self) -> Result<Stream<'_, User>>;

    /// Every interactive query whose text equals `text` exactly.
    fn get_interactive_queries_with_text<'a>(&'a self, text: &'a str) -> Result<Stream<'a, Query>> {
        let all = self.get_queries(Interactivity::Interactive)?;
        Ok(Box::new(all.filter(move |q| match q {
            Ok(q) => q.text == text,
            Err(_) => true,
        })))
    }

    /// True when calling a method twice replays identical data.
    fn is_restartable(&self) -> bool {
        false
    }
}
