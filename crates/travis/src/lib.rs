pub mod listener;
pub mod payload;
pub mod verify;

pub use listener::TravisListener;
pub use payload::BuildEvent;
pub use verify::{PublicKeySource, TravisKeySource, verify_payload};
