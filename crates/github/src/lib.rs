pub mod events;
pub mod listener;
pub mod trust;
pub mod webhook;

pub use events::{RepoEvent, RepoEventKind};
pub use listener::GitHubListener;
pub use trust::TrustedProjects;
pub use webhook::WebhookSecret;
