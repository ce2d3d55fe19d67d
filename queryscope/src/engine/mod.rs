pub mod classifier;
pub mod dispatcher;
pub mod pipeline;
