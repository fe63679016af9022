//! Decision pipeline: turns one `pull_request` delivery into zero or one
//! pull-request comment.

pub mod filters;
mod handler;

pub use filters::Suppression;
pub use handler::{Outcome, PipelineError, PipelineSettings, PullRequestHandler};
