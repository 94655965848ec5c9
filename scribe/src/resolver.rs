//! The cascading context resolver.
//!
//! Probes run strictly in registration order and the first hit wins; later
//! probes are never consulted once one answers. A probe that errors, finds
//! nothing, or blows its deadline just yields to the next one.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::probes::{
    ConfigProbe, ContextProbe, LiveSessionProbe, LocalHistoryProbe, NoteStore, ProcessTableProbe,
};
use crate::session::Session;
use crate::types::DetectionResult;

pub struct ContextResolver {
    probes: Vec<Box<dyn ContextProbe>>,
}

impl ContextResolver {
    /// The standard cascade: explicit config, then local history, then the
    /// process table, then the live session. Cheapest and most explicit
    /// evidence first.
    pub fn new(config: HostConfig, store: Arc<dyn NoteStore>, session: Arc<Session>) -> Self {
        let probes: Vec<Box<dyn ContextProbe>> = vec![
            Box::new(ConfigProbe::new(config.clone())),
            Box::new(LocalHistoryProbe::new(config.clone(), store)),
            Box::new(ProcessTableProbe::new(config.clone())),
            Box::new(LiveSessionProbe::new(config, session)),
        ];
        Self { probes }
    }

    /// Custom probe set, mostly for tests.
    pub fn with_probes(probes: Vec<Box<dyn ContextProbe>>) -> Self {
        Self { probes }
    }

    /// Walks the cascade and returns the first detection, or `None` when
    /// every source came up empty.
    pub async fn resolve(&self) -> Option<DetectionResult> {
        for probe in &self.probes {
            let source = probe.source();
            let outcome = match probe.deadline() {
                Some(deadline) => {
                    match tokio::time::timeout(deadline, probe.attempt()).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(%source, ?deadline, "probe deadline exceeded, moving on");
                            continue;
                        }
                    }
                }
                None => probe.attempt().await,
            };
            match outcome {
                Ok(Some(result)) => {
                    info!(
                        %source,
                        project = %result.identity.id,
                        confidence = result.confidence,
                        "project context detected"
                    );
                    return Some(result);
                }
                Ok(None) => {
                    debug!(%source, "probe found nothing");
                }
                Err(e) => {
                    debug!(%source, error = %e, "probe failed, moving on");
                }
            }
        }
        info!("no project context detected by any probe");
        None
    }
}
