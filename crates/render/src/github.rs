use eveleve_core::{
    models::{Author, Provider, RenderedMessage},
    util::ellipsize,
};
use eveleve_github::events::{
    ForkPayload, IssuesPayload, PullRequestPayload, PushPayload, ReleasePayload, RepoEvent, User,
};

pub const COLOR_GITHUB: u32 = 0x2b1c39;

/// Issue bodies longer than this are cut and suffixed with `...`.
pub const ISSUE_BODY_LIMIT: usize = 365;

/// Render a repository event, or `None` when the event is not announced.
pub fn render_repo_event(event: &RepoEvent) -> Option<RenderedMessage> {
    let msg = match event {
        RepoEvent::Push(push) => render_push(push),
        RepoEvent::Issue(issue) => render_issue(issue)?,
        RepoEvent::PullRequest(pr) => render_pull_request(pr)?,
        RepoEvent::Release(release) => render_release(release)?,
        RepoEvent::Fork(fork) => render_fork(fork),
        _ => return None,
    };
    Some(msg.fit_to_limits())
}

fn author(user: &User) -> Option<Author> {
    Some(Author {
        name: user.login.clone(),
        url: user.html_url.clone(),
        icon_url: user.avatar_url.clone(),
    })
}

fn github_provider() -> Option<Provider> {
    Some(Provider { name: "GitHub".into(), url: "https://github.com".into() })
}

fn render_push(push: &PushPayload) -> RenderedMessage {
    let mut msg = RenderedMessage {
        title: format!("{} sent new commits to {}", push.sender.login, push.repository.full_name),
        color: COLOR_GITHUB,
        author: author(&push.sender),
        provider: github_provider(),
        ..Default::default()
    };
    for commit in &push.commits {
        msg.field(&commit.id, &commit.message);
    }
    msg
}

fn render_issue(payload: &IssuesPayload) -> Option<RenderedMessage> {
    let issue = &payload.issue;
    let title = match payload.action.as_str() {
        "opened" => format!("New Issue {} has been created", issue.number),
        "edited" => format!("Issue {} has been updated", issue.number),
        "deleted" => format!("Issue {} has been deleted", issue.number),
        "closed" => format!("Issue {} has been closed", issue.number),
        _ => return None,
    };
    let mut msg = RenderedMessage {
        title,
        description: format!(
            "{} **{}**\n{}",
            payload.action,
            issue.title,
            ellipsize(&issue.body, ISSUE_BODY_LIMIT)
        ),
        color: COLOR_GITHUB,
        author: author(&issue.user),
        provider: github_provider(),
        ..Default::default()
    };
    let labels = issue.labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>().join(" ");
    if !labels.is_empty() {
        msg.field("Labels", labels);
    }
    let assignees = issue.assignees.iter().map(|u| u.login.as_str()).collect::<Vec<_>>().join(" ");
    if !assignees.is_empty() {
        msg.field("Assignees", assignees);
    }
    if let Some(milestone) = &issue.milestone {
        msg.field("Milestone", &milestone.title);
    }
    msg.field("State", &issue.state);
    Some(msg)
}

fn render_pull_request(payload: &PullRequestPayload) -> Option<RenderedMessage> {
    let pr = &payload.pull_request;
    let verb = match payload.action.as_str() {
        "opened" => "opened",
        "reopened" => "reopened",
        "closed" if pr.merged => "merged",
        "closed" => "closed",
        _ => return None,
    };
    let mut msg = RenderedMessage {
        title: format!("Pull Request {} has been {verb}", pr.number),
        description: format!("**{}**\n{}", pr.title, ellipsize(&pr.body, ISSUE_BODY_LIMIT)),
        color: COLOR_GITHUB,
        author: author(&payload.sender),
        provider: github_provider(),
        ..Default::default()
    };
    msg.field("Repository", &payload.repository.full_name)
        .field("Branch", format!("{} -> {}", pr.head.name, pr.base.name));
    Some(msg)
}

fn render_release(payload: &ReleasePayload) -> Option<RenderedMessage> {
    if payload.action != "published" {
        return None;
    }
    let release = &payload.release;
    let name = if release.name.is_empty() { &release.tag_name } else { &release.name };
    let mut msg = RenderedMessage {
        title: format!("{} released {name}", payload.repository.full_name),
        description: ellipsize(&release.body, ISSUE_BODY_LIMIT).into_owned(),
        color: COLOR_GITHUB,
        author: author(&release.author),
        provider: github_provider(),
        ..Default::default()
    };
    msg.field("Tag", &release.tag_name);
    if release.prerelease {
        msg.field("Pre-release", "yes");
    }
    Some(msg)
}

fn render_fork(payload: &ForkPayload) -> RenderedMessage {
    let mut msg = RenderedMessage {
        title: format!(
            "{} forked {} to {}",
            payload.sender.login, payload.repository.full_name, payload.forkee.full_name
        ),
        color: COLOR_GITHUB,
        author: author(&payload.sender),
        provider: github_provider(),
        ..Default::default()
    };
    if !payload.forkee.html_url.is_empty() {
        msg.field("Fork", &payload.forkee.html_url);
    }
    msg
}

#[cfg(test)]
mod tests {
    use eveleve_github::events::{
        Branch, Issue, Label, Milestone, PullRequest, PushCommit, Release, Repository,
    };

    use super::*;

    fn repo(full_name: &str) -> Repository {
        Repository {
            name: full_name.rsplit('/').next().unwrap().into(),
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    fn user(login: &str) -> User {
        User {
            login: login.into(),
            avatar_url: format!("https://avatars.example/{login}"),
            html_url: format!("https://github.com/{login}"),
            ..Default::default()
        }
    }

    fn issue_event(action: &str, number: u64) -> IssuesPayload {
        IssuesPayload {
            action: action.into(),
            issue: Issue {
                number,
                title: "Crash on start".into(),
                body: "Steps to reproduce".into(),
                state: "closed".into(),
                user: user("reporter"),
                ..Default::default()
            },
            repository: repo("acme/widget"),
            sender: user("octocat"),
        }
    }

    #[test]
    fn test_issue_titles() {
        for (action, title) in [
            ("opened", "New Issue 42 has been created"),
            ("edited", "Issue 42 has been updated"),
            ("deleted", "Issue 42 has been deleted"),
            ("closed", "Issue 42 has been closed"),
        ] {
            let msg = render_repo_event(&RepoEvent::Issue(issue_event(action, 42))).unwrap();
            assert_eq!(msg.title, title);
        }
    }

    #[test]
    fn test_unknown_issue_action_is_skipped() {
        assert_eq!(render_repo_event(&RepoEvent::Issue(issue_event("unknown", 42))), None);
        assert_eq!(render_repo_event(&RepoEvent::Issue(issue_event("labeled", 42))), None);
    }

    #[test]
    fn test_issue_action_and_state_come_from_issue_event() {
        // Every other payload field is empty, so the rendering can only have
        // used the issue event's own action and state.
        let msg = render_repo_event(&RepoEvent::Issue(issue_event("closed", 7))).unwrap();
        assert!(msg.description.starts_with("closed **Crash on start**\n"));
        assert_eq!(msg.fields.last().unwrap().name, "State");
        assert_eq!(msg.fields.last().unwrap().value, "closed");
        assert_eq!(msg.author.unwrap().name, "reporter");
    }

    #[test]
    fn test_issue_optional_fields() {
        let mut event = issue_event("opened", 1);
        let msg = render_repo_event(&RepoEvent::Issue(event.clone())).unwrap();
        let names: Vec<_> = msg.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["State"]);

        event.issue.labels = ["bug", "p1"]
            .map(|name| Label { name: name.into(), ..Default::default() })
            .to_vec();
        event.issue.assignees = vec![user("hubot"), user("mona")];
        event.issue.milestone =
            Some(Milestone { number: 1, title: "v1.0".into(), ..Default::default() });
        let msg = render_repo_event(&RepoEvent::Issue(event)).unwrap();
        let fields: Vec<_> =
            msg.fields.iter().map(|f| (f.name.as_str(), f.value.as_str())).collect();
        assert_eq!(fields, [
            ("Labels", "bug p1"),
            ("Assignees", "hubot mona"),
            ("Milestone", "v1.0"),
            ("State", "closed"),
        ]);
    }

    #[test]
    fn test_issue_body_truncation() {
        let mut event = issue_event("opened", 1);
        event.issue.body = "x".repeat(400);
        let msg = render_repo_event(&RepoEvent::Issue(event.clone())).unwrap();
        let body = msg.description.split_once('\n').unwrap().1;
        assert_eq!(body, format!("{}...", "x".repeat(365)));

        event.issue.body = "y".repeat(365);
        let msg = render_repo_event(&RepoEvent::Issue(event)).unwrap();
        assert!(msg.description.ends_with(&"y".repeat(365)));
        assert!(!msg.description.ends_with("..."));
    }

    #[test]
    fn test_push() {
        let push = PushPayload {
            git_ref: "refs/heads/master".into(),
            commits: vec![
                PushCommit { id: "abc123".into(), message: "First".into(), ..Default::default() },
                PushCommit { id: "def456".into(), message: "Second".into(), ..Default::default() },
            ],
            repository: repo("acme/widget"),
            sender: user("octocat"),
            ..Default::default()
        };
        let msg = render_repo_event(&RepoEvent::Push(push)).unwrap();
        assert_eq!(msg.title, "octocat sent new commits to acme/widget");
        let fields: Vec<_> =
            msg.fields.iter().map(|f| (f.name.as_str(), f.value.as_str())).collect();
        assert_eq!(fields, [("abc123", "First"), ("def456", "Second")]);
        let author = msg.author.unwrap();
        assert_eq!(author.name, "octocat");
        assert_eq!(author.icon_url, "https://avatars.example/octocat");
        assert_eq!(msg.provider.unwrap().name, "GitHub");
    }

    #[test]
    fn test_pull_request_merge() {
        let payload = PullRequestPayload {
            action: "closed".into(),
            number: 5,
            pull_request: PullRequest {
                number: 5,
                title: "Add feature".into(),
                state: "closed".into(),
                merged: true,
                user: user("mona"),
                head: Branch { name: "feature".into(), ..Default::default() },
                base: Branch { name: "master".into(), ..Default::default() },
                ..Default::default()
            },
            repository: repo("acme/widget"),
            sender: user("mona"),
        };
        let msg = render_repo_event(&RepoEvent::PullRequest(payload.clone())).unwrap();
        assert_eq!(msg.title, "Pull Request 5 has been merged");
        assert_eq!(msg.fields[1].value, "feature -> master");

        let labeled = PullRequestPayload { action: "labeled".into(), ..payload };
        assert_eq!(render_repo_event(&RepoEvent::PullRequest(labeled)), None);
    }

    #[test]
    fn test_release() {
        let payload = ReleasePayload {
            action: "published".into(),
            release: Release {
                tag_name: "v1.0.0".into(),
                author: user("mona"),
                ..Default::default()
            },
            repository: repo("acme/widget"),
            sender: user("mona"),
        };
        let msg = render_repo_event(&RepoEvent::Release(payload.clone())).unwrap();
        assert_eq!(msg.title, "acme/widget released v1.0.0");
        let created = ReleasePayload { action: "created".into(), ..payload };
        assert_eq!(render_repo_event(&RepoEvent::Release(created)), None);
    }

    #[test]
    fn test_unannounced_kinds() {
        let milestone = eveleve_github::events::MilestonePayload {
            action: "created".into(),
            repository: repo("acme/widget"),
            ..Default::default()
        };
        assert_eq!(render_repo_event(&RepoEvent::Milestone(milestone)), None);
    }
}
