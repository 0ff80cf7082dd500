pub mod client;
pub mod commands;
pub mod models;

pub use client::DiscordClient;
pub use commands::{CommandPoller, MessageSource, parse_command};
