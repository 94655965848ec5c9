//! Project catalog: enumerates the projects visible on the host's listing
//! page.
//!
//! Candidates are accumulated across every card selector in the chain (the
//! listing markup varies between host releases and several selectors can
//! each see part of it), then deduplicated by id with the first occurrence
//! winning. A raw-markup regex scan is the last resort when no selector
//! matched anything.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::engine::BrowserEngine;
use crate::errors::AutomationError;
use crate::selector::{ChainTable, Role};
use crate::types::ProjectIdentity;

pub struct ProjectCatalog {
    engine: Arc<dyn BrowserEngine>,
    chains: Arc<ChainTable>,
    config: HostConfig,
}

impl ProjectCatalog {
    pub fn new(engine: Arc<dyn BrowserEngine>, chains: Arc<ChainTable>, config: HostConfig) -> Self {
        Self {
            engine,
            chains,
            config,
        }
    }

    /// Navigates to the listing page and returns the deduplicated projects
    /// in first-seen order.
    pub async fn list_projects(&self) -> Result<Vec<ProjectIdentity>, AutomationError> {
        self.engine.navigate(&self.config.projects_url()).await?;
        if let Err(e) = self.engine.wait_for_idle(self.config.idle_timeout).await {
            debug!(error = %e, "listing page never fully settled, scanning anyway");
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut projects: Vec<ProjectIdentity> = Vec::new();

        for selector in self.chains.chain(Role::ProjectCard) {
            let links = match self.engine.collect_links(selector).await {
                Ok(links) => links,
                Err(e) => {
                    debug!(%selector, error = %e, "card selector failed, trying next");
                    continue;
                }
            };
            for link in links {
                let Some(href) = link.href.as_deref() else {
                    continue;
                };
                let Some(id) = self.config.project_id_from_url(href) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    continue;
                }
                let name = if link.text.trim().is_empty() {
                    ProjectIdentity::placeholder_name(&id)
                } else {
                    link.text.trim().to_string()
                };
                let url = self.config.project_url(&id);
                projects.push(ProjectIdentity::new(id, name, url));
            }
        }

        if projects.is_empty() {
            projects = self.scan_raw_markup(&mut seen).await?;
        }

        info!(count = projects.len(), "project listing scanned");
        Ok(projects)
    }

    /// Fallback: pull project ids straight out of the page markup. Names are
    /// not recoverable this way, so placeholders are used.
    async fn scan_raw_markup(
        &self,
        seen: &mut HashSet<String>,
    ) -> Result<Vec<ProjectIdentity>, AutomationError> {
        let markup = self.engine.content().await?;
        let pattern = format!(
            "{}{}([A-Za-z0-9-]+)",
            regex::escape(self.config.base_url.trim_end_matches('/')),
            regex::escape(&self.config.project_path_segment)
        );
        // Also accept relative hrefs, which the listing page commonly uses.
        let relative = format!(
            "href=\"{}([A-Za-z0-9-]+)",
            regex::escape(&self.config.project_path_segment)
        );
        let mut projects = Vec::new();
        for pattern in [pattern, relative] {
            let re = Regex::new(&pattern)
                .map_err(|e| AutomationError::InvalidArgument(format!("bad scan pattern: {e}")))?;
            for captures in re.captures_iter(&markup) {
                let id = captures[1].to_string();
                if !seen.insert(id.clone()) {
                    continue;
                }
                let url = self.config.project_url(&id);
                projects.push(ProjectIdentity::new(
                    id.clone(),
                    ProjectIdentity::placeholder_name(&id),
                    url,
                ));
            }
        }
        debug!(count = projects.len(), "raw markup scan");
        Ok(projects)
    }
}
