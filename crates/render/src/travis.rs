use eveleve_core::models::{Author, RenderedMessage};
use eveleve_travis::BuildEvent;

pub const COLOR_STARTED: u32 = 0xedfd00;
pub const COLOR_FAILED: u32 = 0xff0900;
pub const COLOR_PASSED: u32 = 0x009b3a;

pub const TRAVIS_ICON: &str = "https://travis-ci.com/images/logos/TravisCI-Mascot-blue.png";

pub fn render_build(build: &BuildEvent) -> RenderedMessage {
    let color = if build.is_started() {
        COLOR_STARTED
    } else if build.is_failure() {
        COLOR_FAILED
    } else {
        COLOR_PASSED
    };
    let mut msg = RenderedMessage {
        title: format!("Travis CI: {}", build.status_message),
        color,
        author: Some(Author {
            name: build.author_name.clone(),
            url: build.build_url.clone(),
            icon_url: TRAVIS_ICON.to_string(),
        }),
        ..Default::default()
    };
    msg.field("Started By", &build.event_type)
        .field("Message", &build.message)
        .field("Repository", build.repository.slug());
    if !build.repository.url.is_empty() {
        msg.field("Repository URL", &build.repository.url);
    }
    msg.fit_to_limits()
}
