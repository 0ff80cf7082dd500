use std::time::Duration;

use eveleve_core::{config::Config, models::Command, util::format_uptime};
use eveleve_github::TrustedProjects;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = "Available commands:
`!help` show this message
`!ping` check that the bot is alive
`!projects` list the projects allowed to post events
`!status` show uptime
`!version` show the bot version";

/// What a command handler can see.
pub struct CommandContext<'a> {
    pub config: &'a Config,
    pub trusted: &'a TrustedProjects,
    pub uptime: Duration,
}

/// Reply text for a command, or `None` when there is nothing to say.
pub fn handle(command: &Command, ctx: &CommandContext<'_>) -> Option<String> {
    match command.verb.as_str() {
        "!help" => Some(HELP.to_string()),
        "!ping" => Some("pong".to_string()),
        "!projects" => Some(projects(ctx.trusted)),
        "!status" => Some(status(ctx)),
        "!version" => Some(format!("EvelEve {VERSION}")),
        verb => {
            tracing::debug!("Unknown command {verb}");
            Some(format!("Unknown command `{verb}`, try `!help`"))
        }
    }
}

fn projects(trusted: &TrustedProjects) -> String {
    if trusted.is_empty() {
        return "No projects configured".to_string();
    }
    let mut reply = format!("Tracking {} projects:", trusted.len());
    for name in trusted.iter() {
        reply.push_str("\nhttps://github.com/");
        reply.push_str(name);
    }
    reply
}

fn status(ctx: &CommandContext<'_>) -> String {
    let mut reply = String::new();
    if !ctx.config.id.is_empty() {
        reply.push_str(&format!("**{}**", ctx.config.id));
        if !ctx.config.description.is_empty() {
            reply.push_str(&format!(" {}", ctx.config.description));
        }
        reply.push('\n');
    }
    reply.push_str(&format!("Uptime: {}", format_uptime(ctx.uptime)));
    reply
}
