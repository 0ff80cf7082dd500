use serde::{Deserialize, Deserializer, Serialize};

/// A Travis CI build notification.
///
/// Travis sends `null` for many fields while a build is still running, so
/// string and flag fields fall back to their defaults instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildEvent {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub number: String,
    /// What started the build: `push`, `pull_request`, `cron`, `api`.
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub event_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    /// Provider status code: 0 passed, 1 failed or errored, `None` while running.
    #[serde(default)]
    pub status: Option<u32>,
    #[serde(default)]
    pub result: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub status_message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub result_message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub started_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub finished_at: String,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub build_url: String,
    #[serde(default)]
    pub commit_id: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub commit: String,
    #[serde(default, deserialize_with = "nullable")]
    pub base_commit: String,
    #[serde(default, deserialize_with = "nullable")]
    pub head_commit: String,
    #[serde(default, deserialize_with = "nullable")]
    pub branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub compare_url: String,
    #[serde(default, alias = "commited_at", deserialize_with = "nullable")]
    pub committed_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author_email: String,
    #[serde(default, alias = "commited_name", deserialize_with = "nullable")]
    pub committer_name: String,
    #[serde(default, alias = "commited_email", deserialize_with = "nullable")]
    pub committer_email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pull_request: bool,
    #[serde(default)]
    pub pull_request_number: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub pull_request_title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag: String,
    pub repository: Repository,
    #[serde(default, deserialize_with = "nullable")]
    pub matrix: Vec<MatrixJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub owner_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
}

impl Repository {
    pub fn slug(&self) -> String { format!("{}/{}", self.owner_name, self.name) }
}

/// One job of a build matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatrixJob {
    pub id: u64,
    #[serde(default)]
    pub repository_id: u64,
    #[serde(default)]
    pub parent_id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub number: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default)]
    pub status: Option<u32>,
    #[serde(default)]
    pub result: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub commit: String,
    #[serde(default, deserialize_with = "nullable")]
    pub branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub compare_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub started_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub finished_at: String,
    #[serde(default, alias = "commited_at", deserialize_with = "nullable")]
    pub committed_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author_email: String,
    #[serde(default, alias = "commiter_name", deserialize_with = "nullable")]
    pub committer_name: String,
    #[serde(default, alias = "commiter_email", deserialize_with = "nullable")]
    pub committer_email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub allow_failure: bool,
}

impl BuildEvent {
    pub fn parse(payload: &str) -> serde_json::Result<Self> { serde_json::from_str(payload) }

    pub fn is_started(&self) -> bool { self.state == "started" }

    pub fn is_failure(&self) -> bool { self.status.is_some_and(|s| s != 0) }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
