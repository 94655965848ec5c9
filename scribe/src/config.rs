use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the core needs to know about the host application, plus the
/// timing policy. Every timeout literal lives here (or in
/// `SubmissionTiming`) so the cascading resolver's latency stays predictable
/// and the values are testable in one place.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Root of the host application's web surface.
    pub base_url: String,
    /// Path segment that precedes a project id in host URLs.
    pub project_path_segment: String,
    /// Listing page for all projects.
    pub projects_path: String,
    /// URL substrings that mark a login/auth page.
    pub login_markers: Vec<String>,
    /// Process-name fragment identifying the host application.
    pub host_process_name: String,
    /// Environment variable carrying an explicit project id.
    pub env_project_id: String,
    /// Environment variable carrying an explicit display name.
    pub env_project_name: String,
    /// Browser profile directory; login state persists here across runs.
    pub profile_dir: PathBuf,
    /// Hard deadline for the live-session probe as a whole.
    pub live_probe_deadline: Duration,
    /// Sub-deadline for one page-title read inside the live-session probe.
    pub title_deadline: Duration,
    /// Bounded wait for a page to settle after navigation.
    pub idle_timeout: Duration,
    /// How many recent notes the local-history probe scans.
    pub history_scan_limit: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: "https://claude.ai".to_string(),
            project_path_segment: "/project/".to_string(),
            projects_path: "/projects".to_string(),
            login_markers: vec!["login".to_string(), "auth".to_string()],
            host_process_name: "Claude".to_string(),
            env_project_id: "SCRIBE_PROJECT_ID".to_string(),
            env_project_name: "SCRIBE_PROJECT_NAME".to_string(),
            profile_dir: default_profile_dir(),
            live_probe_deadline: Duration::from_secs(10),
            title_deadline: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(15),
            history_scan_limit: 5,
        }
    }
}

impl HostConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var("SCRIBE_BASE_URL") {
            if !url.trim().is_empty() {
                cfg.base_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Ok(dir) = env::var("SCRIBE_PROFILE_DIR") {
            if !dir.trim().is_empty() {
                cfg.profile_dir = PathBuf::from(dir);
            }
        }
        cfg
    }

    pub fn project_url(&self, id: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.project_path_segment,
            id
        )
    }

    pub fn projects_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.projects_path)
    }

    /// The knowledge surface of one project.
    pub fn knowledge_url(&self, id: &str) -> String {
        format!("{}/knowledge", self.project_url(id))
    }

    /// Whether a URL points at a login/auth page of the host.
    pub fn is_login_url(&self, url: &str) -> bool {
        self.login_markers.iter().any(|m| url.contains(m.as_str()))
    }

    /// Whether a URL is within the host application's domain.
    pub fn in_domain(&self, url: &str) -> bool {
        let domain = self
            .base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        url.contains(domain)
    }

    /// Extracts a project id from a URL or href, if present after the
    /// project path segment.
    pub fn project_id_from_url(&self, url: &str) -> Option<String> {
        let idx = url.find(self.project_path_segment.as_str())?;
        let rest = &url[idx + self.project_path_segment.len()..];
        let id: String = rest
            .chars()
            .take_while(|c| !matches!(c, '/' | '?' | '#'))
            .collect();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

fn default_profile_dir() -> PathBuf {
    let base = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir);
    base.join(".scribe").join("browser-profile")
}
