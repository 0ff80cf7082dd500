//! Chat renderings of relayed events.
//!
//! Everything here is a pure function of its input.

pub mod github;
pub mod text;
pub mod travis;

pub use github::render_repo_event;
pub use text::split_message;
pub use travis::render_build;
