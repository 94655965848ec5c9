pub use crate::utils::ScribeWrapper;
use crate::notes::SqliteNoteStore;
use crate::utils::{
    AccessProjectArgs, AddKnowledgeArgs, EmptyArgs, GetRecentNotesArgs, SelectProjectArgs,
};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{tool, Error as McpError, ServerHandler};
use rmcp::{tool_handler, tool_router};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use scribe::{
    AuthState, ContextResolver, HostConfig, KnowledgeEntry, KnowledgeSubmission, NoteStore,
    ProjectCatalog, ProjectIdentity, Role, Session,
};

fn internal(context: &str, e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(
        context.to_string(),
        Some(json!({ "reason": e.to_string() })),
    )
}

/// A domain outcome the model should see and react to, not a transport
/// failure. Rendered as a successful call with a status payload.
fn status_result(status: &str, message: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::json(json!({
        "status": status,
        "message": message,
    }))?]))
}

fn awaiting_login() -> Result<CallToolResult, McpError> {
    status_result(
        "awaiting_authentication",
        "Not logged in. Complete the login in the opened browser window, then retry this tool."
            .to_string(),
    )
}

fn project_json(project: &ProjectIdentity) -> serde_json::Value {
    json!({
        "id": project.id,
        "name": project.display_name,
        "url": project.canonical_url,
    })
}

#[tool_router]
impl ScribeWrapper {
    pub async fn new(config: HostConfig, notes_db: Option<PathBuf>) -> Result<Self, McpError> {
        let chains = scribe::ChainTable::default();
        let session = Session::new(config.clone(), chains)
            .map_err(|e| internal("Selector chain table failed validation", e))?;
        let session = Arc::new(session);
        let notes: Arc<dyn NoteStore> = Arc::new(SqliteNoteStore::new(
            notes_db.unwrap_or_else(SqliteNoteStore::default_path),
        ));
        let resolver = Arc::new(ContextResolver::new(
            config.clone(),
            notes.clone(),
            session.clone(),
        ));
        Ok(Self {
            config,
            session,
            resolver,
            notes,
            current: Arc::new(Mutex::new(None)),
            catalog_cache: Arc::new(Mutex::new(Vec::new())),
            tool_router: Self::tool_router(),
        })
    }

    /// Ensures the session is up and authenticated. `Ok(None)` means go
    /// ahead; `Ok(Some(result))` is the response to hand straight back.
    async fn ensure_ready(&self) -> Result<Option<CallToolResult>, McpError> {
        let auth = self
            .session
            .initialize()
            .await
            .map_err(|e| internal("Browser session failed to start", e))?;
        match auth {
            AuthState::Authenticated => Ok(None),
            AuthState::Unauthenticated | AuthState::Unknown => {
                awaiting_login().map(Some)
            }
        }
    }

    #[tool(
        description = "Detect which project the user is currently working in, by cascading over explicit configuration, recent local notes, the process table and any already-open browser session. Read-only: never launches a browser."
    )]
    pub async fn detect_project_context(
        &self,
        Parameters(_args): Parameters<EmptyArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.resolver.resolve().await {
            Some(found) => {
                *self.current.lock().await = Some(found.identity.clone());
                Ok(CallToolResult::success(vec![Content::json(json!({
                    "status": "detected",
                    "project": project_json(&found.identity),
                    "source": found.source.to_string(),
                    "confidence": found.confidence,
                }))?]))
            }
            None => status_result(
                "not_detected",
                "No project context found. Use list_projects to pick one explicitly.".to_string(),
            ),
        }
    }

    #[tool(
        description = "List the projects visible on the host's project listing page. Starts the browser session if needed; may report that a login is required first."
    )]
    pub async fn list_projects(
        &self,
        Parameters(_args): Parameters<EmptyArgs>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(blocked) = self.ensure_ready().await? {
            return Ok(blocked);
        }
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| internal("Session reported ready without an engine", "no engine"))?;
        let catalog = ProjectCatalog::new(engine, self.session.chains(), self.config.clone());
        let projects = catalog
            .list_projects()
            .await
            .map_err(|e| internal("Project listing scan failed", e))?;
        *self.catalog_cache.lock().await = projects.clone();
        Ok(CallToolResult::success(vec![Content::json(json!({
            "status": "ok",
            "count": projects.len(),
            "projects": projects.iter().map(project_json).collect::<Vec<_>>(),
        }))?]))
    }

    #[tool(
        description = "Select a project, by id or by the display name shown in list_projects, as the target for subsequent knowledge capture. Navigates the browser session to the project page."
    )]
    pub async fn select_project(
        &self,
        Parameters(args): Parameters<SelectProjectArgs>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(blocked) = self.ensure_ready().await? {
            return Ok(blocked);
        }
        let identity = self.open_project(&args.project_id).await?;
        *self.current.lock().await = Some(identity.clone());
        Ok(CallToolResult::success(vec![Content::json(json!({
            "status": "selected",
            "project": project_json(&identity),
        }))?]))
    }

    #[tool(
        description = "Open a project page in the browser session and report what is actually on screen: resolved title, final URL and authentication state."
    )]
    pub async fn access_project(
        &self,
        Parameters(args): Parameters<AccessProjectArgs>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(blocked) = self.ensure_ready().await? {
            return Ok(blocked);
        }
        let identity = self.open_project(&args.project_id).await?;
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| internal("Session reported ready without an engine", "no engine"))?;
        let final_url = engine.current_url().await.unwrap_or_default();
        *self.current.lock().await = Some(identity.clone());
        Ok(CallToolResult::success(vec![Content::json(json!({
            "status": "ok",
            "project": project_json(&identity),
            "final_url": final_url,
        }))?]))
    }

    #[tool(
        description = "Report the currently selected project, running context detection first if nothing has been selected yet."
    )]
    pub async fn get_current_project(
        &self,
        Parameters(_args): Parameters<EmptyArgs>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(project) = self.current.lock().await.clone() {
            return Ok(CallToolResult::success(vec![Content::json(json!({
                "status": "selected",
                "project": project_json(&project),
            }))?]));
        }
        self.detect_project_context(Parameters(EmptyArgs {})).await
    }

    #[tool(
        description = "Add a knowledge entry (title, content, optional category/tags/importance) to a project's knowledge page through the browser session. Success means the entry form was opened and submitted, not that the host stored it; re-running a reported failure can create a duplicate."
    )]
    pub async fn add_project_knowledge(
        &self,
        Parameters(args): Parameters<AddKnowledgeArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project = match &args.project_id {
            Some(id) => Some(self.identity_for(id).await),
            None => self.current.lock().await.clone(),
        };
        let project = match project {
            Some(project) => project,
            None => match self.resolver.resolve().await {
                Some(found) => found.identity,
                None => {
                    return status_result(
                        "no_project",
                        "No target project. Pass project_id, or call select_project first."
                            .to_string(),
                    )
                }
            },
        };

        if let Some(blocked) = self.ensure_ready().await? {
            return Ok(blocked);
        }
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| internal("Session reported ready without an engine", "no engine"))?;
        let locator = self
            .session
            .locator()
            .await
            .ok_or_else(|| internal("Session reported ready without an engine", "no locator"))?;

        let mut entry = KnowledgeEntry::new(args.title, args.content);
        if let Some(category) = args.category {
            entry.category = category;
        }
        if let Some(tags) = args.tags {
            entry.tags = tags;
        }
        if let Some(importance) = args.importance {
            entry.importance = importance.clamp(1, 5);
        }

        let report = KnowledgeSubmission::new(engine, locator)
            .run(&project, &entry, &self.config)
            .await;
        Ok(CallToolResult::success(vec![Content::json(json!({
            "status": if report.succeeded { "submitted" } else { "failed" },
            "project": project_json(&project),
            "steps": report.steps,
        }))?]))
    }

    #[tool(
        description = "Read the most recent notes from the host application's local note database. Read-only; reports unavailability if the database is missing."
    )]
    pub async fn get_recent_notes(
        &self,
        Parameters(args): Parameters<GetRecentNotesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let limit = args.limit.unwrap_or(10).clamp(1, 100);
        match self.notes.read_recent_notes(limit).await {
            Ok(notes) => Ok(CallToolResult::success(vec![Content::json(json!({
                "status": "ok",
                "count": notes.len(),
                "notes": notes,
            }))?])),
            Err(e) => status_result("unavailable", e.to_string()),
        }
    }

    /// Best-known identity for an id or display name: the catalog cache if
    /// the listing has been scanned, a placeholder otherwise. Users refer to
    /// projects by the name they see on screen as often as by id.
    async fn identity_for(&self, id: &str) -> ProjectIdentity {
        if let Some(known) = self
            .catalog_cache
            .lock()
            .await
            .iter()
            .find(|p| p.id == id || p.display_name == id)
        {
            return known.clone();
        }
        ProjectIdentity::new(
            id,
            ProjectIdentity::placeholder_name(id),
            self.config.project_url(id),
        )
    }

    /// Navigates to a project page and refines the identity with the title
    /// actually rendered there.
    async fn open_project(&self, id: &str) -> Result<ProjectIdentity, McpError> {
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| internal("Session reported ready without an engine", "no engine"))?;
        let mut identity = self.identity_for(id).await;
        engine
            .navigate(&identity.canonical_url)
            .await
            .map_err(|e| internal("Could not open the project page", e))?;
        if let Err(e) = engine.wait_for_idle(self.config.idle_timeout).await {
            tracing::debug!(error = %e, "project page never fully settled");
        }
        if let Some(locator) = self.session.locator().await {
            if let Some(handle) = locator.locate(Role::ProjectTitle).await {
                if let Ok(title) = handle.text().await {
                    let title = title.trim();
                    if !title.is_empty() {
                        identity.display_name = title.to_string();
                    }
                }
            }
        }
        Ok(identity)
    }
}

#[tool_handler]
impl ServerHandler for ScribeWrapper {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(get_server_instructions().to_string()),
        }
    }
}

fn get_server_instructions() -> &'static str {
    "\
Scribe captures knowledge into the user's current project through a real \
browser session, because the host application exposes no stable API.

Recommended flow:

1. Call `detect_project_context` first. It is read-only and cheap; if it \
finds a project you can go straight to `add_project_knowledge`.
2. If nothing is detected, call `list_projects` and then `select_project` \
with the id the user picks. These tools start a visible browser session; \
when they answer `awaiting_authentication`, ask the user to log in in that \
window and then retry the same call.
3. `add_project_knowledge` reports success when the entry form was opened \
and submitted. It cannot verify that the host stored the entry, and \
retrying a reported failure can create a duplicate - tell the user to \
check the project page instead of retrying blindly.
4. `get_recent_notes` reads the host's local note history and works even \
when no browser session is running."
}
