const GITHUB_PREFIX: &str = "github.com/";

/// Repositories allowed to post events, as `owner/name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProjects(Vec<String>);

impl TrustedProjects {
    /// Keep the `github.com/` entries of the configured project list.
    pub fn from_config(projects: &[String]) -> Self {
        let mut trusted = Vec::with_capacity(projects.len());
        for project in projects {
            match project.strip_prefix(GITHUB_PREFIX) {
                Some(name) => {
                    tracing::info!("Adding project {name}");
                    trusted.push(name.to_string());
                }
                None => tracing::info!("Ignoring not a GitHub project: {project}"),
            }
        }
        tracing::info!("{} projects added in total", trusted.len());
        Self(trusted)
    }

    pub fn contains(&self, full_name: &str) -> bool { self.0.iter().any(|p| p == full_name) }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}
