use anyhow::Result;
use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use scribe::{ContextResolver, HostConfig, NoteStore, ProjectIdentity, Session};

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct EmptyArgs {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SelectProjectArgs {
    #[schemars(
        description = "Project id or display name, as returned by list_projects or detect_project_context"
    )]
    pub project_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AccessProjectArgs {
    #[schemars(description = "Project id to open in the browser session")]
    pub project_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddKnowledgeArgs {
    #[schemars(description = "Title of the knowledge entry")]
    pub title: String,
    #[schemars(description = "Body text of the knowledge entry")]
    pub content: String,
    #[schemars(description = "Category label (defaults to 'general')")]
    pub category: Option<String>,
    #[schemars(description = "Free-form tags")]
    pub tags: Option<Vec<String>>,
    #[schemars(description = "Importance from 1 (low) to 5 (critical), defaults to 3")]
    pub importance: Option<u8>,
    #[schemars(
        description = "Target project id; omit to use the selected or auto-detected project"
    )]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetRecentNotesArgs {
    #[schemars(description = "How many notes to return, newest first (defaults to 10)")]
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct ScribeWrapper {
    pub config: HostConfig,
    pub session: Arc<Session>,
    pub resolver: Arc<ContextResolver>,
    pub notes: Arc<dyn NoteStore>,
    pub current: Arc<Mutex<Option<ProjectIdentity>>>,
    pub catalog_cache: Arc<Mutex<Vec<ProjectIdentity>>>,
    pub tool_router: rmcp::handler::server::tool::ToolRouter<Self>,
}

pub fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}
