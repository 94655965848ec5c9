use serde::{Deserialize, Serialize};
use std::fmt;

/// A project as discovered by a probe or a catalog scan.
///
/// The `id` is opaque and source-defined but stable across detection
/// methods. A value is never mutated after construction; a higher-confidence
/// detection supersedes the whole value rather than merging into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    pub id: String,
    pub display_name: String,
    pub canonical_url: String,
}

impl ProjectIdentity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        canonical_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            canonical_url: canonical_url.into(),
        }
    }

    /// Display name derived from a truncated id, used when no human-readable
    /// name is recoverable.
    pub fn placeholder_name(id: &str) -> String {
        let prefix: String = id.chars().take(8).collect();
        format!("Project {prefix}")
    }
}

/// Which evidence source produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionSource {
    Config,
    LocalHistory,
    ProcessTable,
    LiveSession,
}

impl DetectionSource {
    /// Static trust rank, used for logging and explainability only. The
    /// resolver is first-match-wins, not best-of-all, so this never decides
    /// a conflict.
    pub fn confidence(&self) -> u8 {
        match self {
            DetectionSource::Config => 5,
            DetectionSource::LiveSession => 5,
            DetectionSource::LocalHistory => 4,
            DetectionSource::ProcessTable => 3,
        }
    }
}

impl fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub identity: ProjectIdentity,
    pub source: DetectionSource,
    pub confidence: u8,
}

impl DetectionResult {
    pub fn new(identity: ProjectIdentity, source: DetectionSource) -> Self {
        Self {
            identity,
            source,
            confidence: source.confidence(),
        }
    }
}

/// One entry destined for the host application's knowledge surface.
///
/// Produced by the caller and consumed once by the submission transaction;
/// the core does not retain it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    /// 1 (low) to 5 (critical).
    pub importance: u8,
}

impl KnowledgeEntry {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category: "general".to_string(),
            tags: Vec::new(),
            importance: 3,
        }
    }

    /// The metadata header layout the host UI's body field receives.
    pub fn formatted_body(&self) -> String {
        format!(
            "Category: {}\nTags: {}\nImportance: {}/5\n\n{}",
            self.category,
            self.tags.join(", "),
            self.importance,
            self.body
        )
    }
}

/// A record from the host application's local note store, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub title: String,
    pub content: String,
    pub created_at: String,
}

/// Lifecycle of the browser automation session. Owned exclusively by the
/// session controller; no other component mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Launching,
    AwaitingAuthentication,
    Ready,
    Closed,
}

/// Outcome of authentication detection. `Unknown` exists so callers can pick
/// their own risk tolerance instead of the controller silently assuming a
/// logged-in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
    Unknown,
}
