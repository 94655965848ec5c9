//! Scribe: project-context resolution and browser-session automation for a
//! host application that exposes no stable programmatic API.
//!
//! The crate has two halves. The resolution half answers "which project is
//! the user working in right now?" by cascading over independent evidence
//! sources (explicit configuration, local note history, the process table,
//! an already-open browser session) with first-match-wins semantics. The
//! automation half drives a real browser through the host's web UI, in the
//! style of a Playwright SDK: a capability trait at the engine seam,
//! semantic roles resolved through ordered selector fallback chains, and an
//! explicit step machine for the knowledge-submission transaction.
//!
//! ```no_run
//! use std::sync::Arc;
//! use scribe::{ChainTable, ContextResolver, HostConfig, Session};
//! # use scribe::{AutomationError, NoteStore};
//! # async fn demo(store: Arc<dyn NoteStore>) -> Result<(), AutomationError> {
//! let config = HostConfig::from_env();
//! let session = Arc::new(Session::new(config.clone(), ChainTable::default())?);
//! let resolver = ContextResolver::new(config, store, session.clone());
//! if let Some(found) = resolver.resolve().await {
//!     println!("working in {} (via {})", found.identity.display_name, found.source);
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cdp;
pub mod config;
pub mod engine;
pub mod errors;
pub mod locator;
pub mod probes;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod submission;
pub mod types;

#[cfg(test)]
mod tests;

pub use catalog::ProjectCatalog;
pub use cdp::{CdpConfig, CdpEngine};
pub use config::HostConfig;
pub use engine::{BrowserEngine, LinkInfo, PageInfo};
pub use errors::AutomationError;
pub use locator::{ElementHandle, Locator};
pub use probes::{
    ConfigProbe, ContextProbe, LiveSessionProbe, LocalHistoryProbe, NoteStore, ProcessTableProbe,
};
pub use resolver::ContextResolver;
pub use selector::{ChainTable, Role, Selector};
pub use session::{detect_authentication, settle, Session};
pub use submission::{
    KnowledgeSubmission, StepOutcome, SubmissionReport, SubmissionTiming, SubmitStep,
};
pub use types::{
    AuthState, DetectionResult, DetectionSource, KnowledgeEntry, NoteRecord, ProjectIdentity,
    SessionState,
};
