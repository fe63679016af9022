//! GitHub webhook handling.
//!
//! - Signature verification for delivery bodies (HMAC-SHA256)
//! - Parsing of `pull_request` deliveries into [`PullRequestEvent`]

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{BaseChange, PrAction, PrChanges, PullRequestEvent};
pub use parser::{ParseError, parse_pull_request};
pub use signature::{parse_signature_header, sign_payload, verify_signature};
