//! Signal probes for project-context resolution.
//!
//! Each probe inspects one independent source of evidence and answers with
//! at most one candidate. Probes never panic on missing sources; absence is
//! `Ok(None)` or a typed `SourceUnavailable`, and the resolver treats both
//! the same way.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

use crate::config::HostConfig;
use crate::engine::BrowserEngine;
use crate::errors::AutomationError;
use crate::session::Session;
use crate::types::{DetectionResult, DetectionSource, NoteRecord, ProjectIdentity};

/// UUID-shaped id after the project path marker. Shorter or malformed ids in
/// free text are ignored; only hrefs scanned by the catalog accept looser
/// shapes.
static IDENTITY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"project/([0-9a-fA-F-]{36})").expect("identity token pattern"));

/// Read access to the host application's local note history.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Newest-first slice of recent notes. A missing or unreadable store is
    /// `SourceUnavailable`, never a panic.
    async fn read_recent_notes(&self, limit: usize) -> Result<Vec<NoteRecord>, AutomationError>;
}

/// One evidence source in the resolution cascade.
#[async_trait]
pub trait ContextProbe: Send + Sync {
    fn source(&self) -> DetectionSource;

    /// Hard wall-clock bound the resolver applies around `attempt`, if any.
    fn deadline(&self) -> Option<std::time::Duration> {
        None
    }

    async fn attempt(&self) -> Result<Option<DetectionResult>, AutomationError>;
}

/// Explicit configuration via environment variables. Highest confidence and
/// always cheap.
pub struct ConfigProbe {
    config: HostConfig,
}

impl ConfigProbe {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ContextProbe for ConfigProbe {
    fn source(&self) -> DetectionSource {
        DetectionSource::Config
    }

    async fn attempt(&self) -> Result<Option<DetectionResult>, AutomationError> {
        let id = match std::env::var(&self.config.env_project_id) {
            Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => return Ok(None),
        };
        let name = std::env::var(&self.config.env_project_name)
            .ok()
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| ProjectIdentity::placeholder_name(&id));
        let url = self.config.project_url(&id);
        Ok(Some(DetectionResult::new(
            ProjectIdentity::new(id, name, url),
            DetectionSource::Config,
        )))
    }
}

/// Scans recent local notes for an embedded project URL.
pub struct LocalHistoryProbe {
    config: HostConfig,
    store: Arc<dyn NoteStore>,
}

impl LocalHistoryProbe {
    pub fn new(config: HostConfig, store: Arc<dyn NoteStore>) -> Self {
        Self { config, store }
    }
}

#[async_trait]
impl ContextProbe for LocalHistoryProbe {
    fn source(&self) -> DetectionSource {
        DetectionSource::LocalHistory
    }

    async fn attempt(&self) -> Result<Option<DetectionResult>, AutomationError> {
        let notes = self
            .store
            .read_recent_notes(self.config.history_scan_limit)
            .await?;
        for note in &notes {
            if let Some(captures) = IDENTITY_TOKEN.captures(&note.content) {
                let id = captures[1].to_string();
                let name = if note.title.trim().is_empty() {
                    ProjectIdentity::placeholder_name(&id)
                } else {
                    note.title.trim().to_string()
                };
                let url = self.config.project_url(&id);
                return Ok(Some(DetectionResult::new(
                    ProjectIdentity::new(id, name, url),
                    DetectionSource::LocalHistory,
                )));
            }
        }
        debug!(scanned = notes.len(), "no project token in recent notes");
        Ok(None)
    }
}

/// Scans the process table for a host-application process whose command line
/// carries a project URL.
pub struct ProcessTableProbe {
    config: HostConfig,
}

impl ProcessTableProbe {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ContextProbe for ProcessTableProbe {
    fn source(&self) -> DetectionSource {
        DetectionSource::ProcessTable
    }

    async fn attempt(&self) -> Result<Option<DetectionResult>, AutomationError> {
        let process_name = self.config.host_process_name.clone();
        // sysinfo's scan is blocking work; keep it off the async runtime.
        let found = tokio::task::spawn_blocking(move || {
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::All, true);
            for process in system.processes().values() {
                let name = process.name().to_string_lossy();
                if !name.contains(process_name.as_str()) {
                    continue;
                }
                for arg in process.cmd() {
                    let arg = arg.to_string_lossy();
                    if let Some(captures) = IDENTITY_TOKEN.captures(&arg) {
                        return Some(captures[1].to_string());
                    }
                }
            }
            None
        })
        .await
        .map_err(|e| AutomationError::SourceUnavailable(format!("process scan panicked: {e}")))?;

        Ok(found.map(|id| {
            let url = self.config.project_url(&id);
            DetectionResult::new(
                ProjectIdentity::new(
                    id.clone(),
                    ProjectIdentity::placeholder_name(&id),
                    url,
                ),
                DetectionSource::ProcessTable,
            )
        }))
    }
}

/// Looks for a project page among the open tabs of an already-running
/// session. Never launches a browser: an uninitialized session is simply no
/// evidence.
pub struct LiveSessionProbe {
    config: HostConfig,
    session: Arc<Session>,
}

impl LiveSessionProbe {
    pub fn new(config: HostConfig, session: Arc<Session>) -> Self {
        Self { config, session }
    }

    async fn page_name(
        &self,
        engine: &Arc<dyn BrowserEngine>,
        page_id: &str,
        fallback_id: &str,
    ) -> String {
        // The title read gets its own short sub-deadline so one stuck tab
        // cannot eat the whole probe budget.
        let title = tokio::time::timeout(self.config.title_deadline, engine.page_title(page_id))
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
        let title = title.trim();
        if title.is_empty() || title.contains(self.config.host_process_name.as_str()) {
            ProjectIdentity::placeholder_name(fallback_id)
        } else {
            title.to_string()
        }
    }
}

#[async_trait]
impl ContextProbe for LiveSessionProbe {
    fn source(&self) -> DetectionSource {
        DetectionSource::LiveSession
    }

    fn deadline(&self) -> Option<std::time::Duration> {
        Some(self.config.live_probe_deadline)
    }

    async fn attempt(&self) -> Result<Option<DetectionResult>, AutomationError> {
        let Some(engine) = self.session.engine().await else {
            debug!("session not initialized, skipping live-session probe");
            return Ok(None);
        };
        let pages = engine.open_pages().await?;
        for page in &pages {
            let Some(id) = self.config.project_id_from_url(&page.url) else {
                continue;
            };
            if !IDENTITY_TOKEN.is_match(&page.url) {
                continue;
            }
            let name = match &page.title {
                Some(title)
                    if !title.trim().is_empty()
                        && !title.contains(self.config.host_process_name.as_str()) =>
                {
                    title.trim().to_string()
                }
                _ => self.page_name(&engine, &page.id, &id).await,
            };
            let url = self.config.project_url(&id);
            return Ok(Some(DetectionResult::new(
                ProjectIdentity::new(id, name, url),
                DetectionSource::LiveSession,
            )));
        }
        debug!(open = pages.len(), "no project page among open tabs");
        Ok(None)
    }
}
