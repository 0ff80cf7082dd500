//! Typed GitHub repository webhook payloads.
//!
//! Only the fields the relay renders or routes on are modeled; everything
//! else in the payload is ignored. Fields GitHub may send as `null` fall back
//! to their defaults.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Event name from the `X-GitHub-Event` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoEventKind {
    CommitComment,
    Fork,
    Issue,
    IssueComment,
    Milestone,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    Push,
    VulnerabilityAlert,
    Release,
    SecurityAdvisory,
}

impl RepoEventKind {
    pub const ALL: [RepoEventKind; 12] = [
        Self::CommitComment,
        Self::Fork,
        Self::Issue,
        Self::IssueComment,
        Self::Milestone,
        Self::PullRequest,
        Self::PullRequestReview,
        Self::PullRequestReviewComment,
        Self::Push,
        Self::VulnerabilityAlert,
        Self::Release,
        Self::SecurityAdvisory,
    ];

    /// Returns `None` for events the relay does not handle, such as `ping`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommitComment => "commit_comment",
            Self::Fork => "fork",
            Self::Issue => "issues",
            Self::IssueComment => "issue_comment",
            Self::Milestone => "milestone",
            Self::PullRequest => "pull_request",
            Self::PullRequestReview => "pull_request_review",
            Self::PullRequestReviewComment => "pull_request_review_comment",
            Self::Push => "push",
            Self::VulnerabilityAlert => "repository_vulnerability_alert",
            Self::Release => "release",
            Self::SecurityAdvisory => "security_advisory",
        }
    }
}

impl fmt::Display for RepoEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A verified repository event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoEvent {
    CommitComment(CommitCommentPayload),
    Fork(ForkPayload),
    Issue(IssuesPayload),
    IssueComment(IssueCommentPayload),
    Milestone(MilestonePayload),
    PullRequest(PullRequestPayload),
    PullRequestReview(PullRequestReviewPayload),
    PullRequestReviewComment(PullRequestReviewCommentPayload),
    Push(PushPayload),
    VulnerabilityAlert(VulnerabilityAlertPayload),
    Release(ReleasePayload),
    SecurityAdvisory(SecurityAdvisoryPayload),
}

impl RepoEvent {
    pub fn parse(kind: RepoEventKind, body: &[u8]) -> serde_json::Result<Self> {
        Ok(match kind {
            RepoEventKind::CommitComment => Self::CommitComment(serde_json::from_slice(body)?),
            RepoEventKind::Fork => Self::Fork(serde_json::from_slice(body)?),
            RepoEventKind::Issue => Self::Issue(serde_json::from_slice(body)?),
            RepoEventKind::IssueComment => Self::IssueComment(serde_json::from_slice(body)?),
            RepoEventKind::Milestone => Self::Milestone(serde_json::from_slice(body)?),
            RepoEventKind::PullRequest => Self::PullRequest(serde_json::from_slice(body)?),
            RepoEventKind::PullRequestReview => {
                Self::PullRequestReview(serde_json::from_slice(body)?)
            }
            RepoEventKind::PullRequestReviewComment => {
                Self::PullRequestReviewComment(serde_json::from_slice(body)?)
            }
            RepoEventKind::Push => Self::Push(serde_json::from_slice(body)?),
            RepoEventKind::VulnerabilityAlert => {
                Self::VulnerabilityAlert(serde_json::from_slice(body)?)
            }
            RepoEventKind::Release => Self::Release(serde_json::from_slice(body)?),
            RepoEventKind::SecurityAdvisory => Self::SecurityAdvisory(serde_json::from_slice(body)?),
        })
    }

    pub fn kind(&self) -> RepoEventKind {
        match self {
            Self::CommitComment(_) => RepoEventKind::CommitComment,
            Self::Fork(_) => RepoEventKind::Fork,
            Self::Issue(_) => RepoEventKind::Issue,
            Self::IssueComment(_) => RepoEventKind::IssueComment,
            Self::Milestone(_) => RepoEventKind::Milestone,
            Self::PullRequest(_) => RepoEventKind::PullRequest,
            Self::PullRequestReview(_) => RepoEventKind::PullRequestReview,
            Self::PullRequestReviewComment(_) => RepoEventKind::PullRequestReviewComment,
            Self::Push(_) => RepoEventKind::Push,
            Self::VulnerabilityAlert(_) => RepoEventKind::VulnerabilityAlert,
            Self::Release(_) => RepoEventKind::Release,
            Self::SecurityAdvisory(_) => RepoEventKind::SecurityAdvisory,
        }
    }

    /// The repository the event belongs to. Security advisories are global.
    pub fn repository(&self) -> Option<&Repository> {
        match self {
            Self::CommitComment(p) => Some(&p.repository),
            Self::Fork(p) => Some(&p.repository),
            Self::Issue(p) => Some(&p.repository),
            Self::IssueComment(p) => Some(&p.repository),
            Self::Milestone(p) => Some(&p.repository),
            Self::PullRequest(p) => Some(&p.repository),
            Self::PullRequestReview(p) => Some(&p.repository),
            Self::PullRequestReviewComment(p) => Some(&p.repository),
            Self::Push(p) => Some(&p.repository),
            Self::VulnerabilityAlert(p) => Some(&p.repository),
            Self::Release(p) => Some(&p.repository),
            Self::SecurityAdvisory(_) => None,
        }
    }

    /// `owner/name` of the source repository.
    pub fn full_name(&self) -> Option<&str> { self.repository().map(|r| r.full_name.as_str()) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default)]
    pub owner: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Label {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    pub user: User,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<Label>,
    #[serde(default, deserialize_with = "nullable")]
    pub assignees: Vec<User>,
    #[serde(default)]
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    pub user: User,
    #[serde(default, deserialize_with = "nullable")]
    pub commit_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    pub user: User,
    #[serde(default, deserialize_with = "nullable")]
    pub merged: bool,
    pub head: Branch,
    pub base: Branch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Review {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushCommit {
    pub id: String,
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    pub author: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VulnerabilityAlert {
    pub id: u64,
    pub affected_package_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub affected_range: String,
    #[serde(default, deserialize_with = "nullable")]
    pub fixed_in: String,
    #[serde(default, deserialize_with = "nullable")]
    pub external_identifier: String,
    #[serde(default, deserialize_with = "nullable")]
    pub external_reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecurityAdvisory {
    pub ghsa_id: String,
    pub summary: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub severity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommitCommentPayload {
    pub action: String,
    pub comment: Comment,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ForkPayload {
    pub forkee: Repository,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssuesPayload {
    /// `opened`, `edited`, `deleted`, `closed`, ...
    pub action: String,
    pub issue: Issue,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssueCommentPayload {
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MilestonePayload {
    pub action: String,
    pub milestone: Milestone,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequestReviewPayload {
    pub action: String,
    pub review: Review,
    pub pull_request: PullRequest,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequestReviewCommentPayload {
    pub action: String,
    pub comment: Comment,
    pub pull_request: PullRequest,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub before: String,
    #[serde(default, deserialize_with = "nullable")]
    pub after: String,
    #[serde(default, deserialize_with = "nullable")]
    pub compare: String,
    #[serde(default)]
    pub forced: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub commits: Vec<PushCommit>,
    #[serde(default)]
    pub head_commit: Option<PushCommit>,
    pub pusher: CommitAuthor,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VulnerabilityAlertPayload {
    pub action: String,
    pub alert: VulnerabilityAlert,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleasePayload {
    pub action: String,
    pub release: Release,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecurityAdvisoryPayload {
    pub action: String,
    pub security_advisory: SecurityAdvisory,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
