// queryscope/src/lib.rs
//
// Session reconstruction and automated-query detection for search query logs.
//
//   source      where users and queries come from (files, memory)
//   workers     sessionizer, literal rules, timing statistics
//   state       query groups built over a corpus
//   engine      statistical classifier, full pass, output writer
//   eval        corpus-level summaries

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod model;
pub mod source;
pub mod state;
pub mod workers;

pub use config::AnalysisConfig;
pub use engine::pipeline::{PassOutput, Pipeline};
pub use error::{Error, Result};
pub use model::{Query, Session, SessionView, User};
pub use source::{DataVersion, JsonFileSource, MemorySource, QuerySource};
