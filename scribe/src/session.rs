//! Browser session lifecycle.
//!
//! A `Session` owns at most one live engine and walks the state machine
//! `Closed -> Launching -> {Ready | AwaitingAuthentication} -> Closed`.
//! Initialization is lazy and re-entrant: callers ask for a ready session
//! whenever they need one and get whatever engine is already up.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cdp::{CdpConfig, CdpEngine};
use crate::config::HostConfig;
use crate::engine::BrowserEngine;
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::selector::ChainTable;
use crate::types::{AuthState, SessionState};

struct Inner {
    state: SessionState,
    engine: Option<Arc<dyn BrowserEngine>>,
}

/// Shared automation session. Cheap to clone behind an `Arc`; all state is
/// behind one async mutex.
pub struct Session {
    config: HostConfig,
    chains: Arc<ChainTable>,
    inner: Mutex<Inner>,
}

impl Session {
    /// Chain tables are validated here so a broken table fails loudly at
    /// startup instead of silently skipping roles mid-flow.
    pub fn new(config: HostConfig, chains: ChainTable) -> Result<Self, AutomationError> {
        chains.validate()?;
        Ok(Self {
            config,
            chains: Arc::new(chains),
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                engine: None,
            }),
        })
    }

    /// Test constructor: adopt a pre-built engine instead of launching one.
    pub fn with_engine(
        config: HostConfig,
        chains: ChainTable,
        engine: Arc<dyn BrowserEngine>,
    ) -> Result<Self, AutomationError> {
        let session = Self::new(config, chains)?;
        {
            let mut inner = session.inner.try_lock().map_err(|_| {
                AutomationError::EngineError("fresh session lock contended".to_string())
            })?;
            inner.engine = Some(engine);
        }
        Ok(session)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn chains(&self) -> Arc<ChainTable> {
        self.chains.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// The live engine, if the session has one (launched or injected).
    pub async fn engine(&self) -> Option<Arc<dyn BrowserEngine>> {
        self.inner.lock().await.engine.clone()
    }

    /// A locator over the current engine, if any.
    pub async fn locator(&self) -> Option<Locator> {
        self.engine()
            .await
            .map(|engine| Locator::new(engine, self.chains.clone()))
    }

    /// Brings the session to a usable state and reports where authentication
    /// stands. Re-entrant: an already-Ready session is handed back untouched,
    /// and an AwaitingAuthentication session gets its auth state re-checked
    /// (the user may have logged in since).
    pub async fn initialize(&self) -> Result<AuthState, AutomationError> {
        let mut inner = self.inner.lock().await;

        if inner.state == SessionState::Ready && inner.engine.is_some() {
            return Ok(AuthState::Authenticated);
        }

        let needs_navigation = matches!(
            inner.state,
            SessionState::Uninitialized | SessionState::Closed
        ) || inner.engine.is_none();
        inner.state = SessionState::Launching;

        if inner.engine.is_none() {
            let cdp = CdpConfig::with_profile(self.config.profile_dir.clone());
            match CdpEngine::launch(cdp).await {
                Ok(engine) => {
                    inner.engine = Some(Arc::new(engine));
                }
                Err(e) => {
                    inner.state = SessionState::Closed;
                    return Err(e);
                }
            }
        }
        let engine = inner
            .engine
            .clone()
            .ok_or_else(|| AutomationError::SessionUnavailable("engine vanished".to_string()))?;

        if needs_navigation {
            if let Err(e) = engine.navigate(&self.config.base_url).await {
                let _ = engine.close().await;
                inner.engine = None;
                inner.state = SessionState::Closed;
                return Err(e);
            }
            if let Err(e) = engine.wait_for_idle(self.config.idle_timeout).await {
                warn!(error = %e, "start page never settled, checking auth anyway");
            }
        }

        let auth = detect_authentication(&self.config, &engine, &self.chains).await;
        inner.state = match auth {
            AuthState::Authenticated => SessionState::Ready,
            // Unknown is treated as not-yet-authenticated: the caller gets a
            // session it can render a login prompt over, never a false Ready.
            AuthState::Unauthenticated | AuthState::Unknown => {
                SessionState::AwaitingAuthentication
            }
        };
        info!(state = ?inner.state, ?auth, "session initialized");
        Ok(auth)
    }

    /// Shuts the engine down. Safe to call repeatedly and on a session that
    /// never launched.
    pub async fn close(&self) -> Result<(), AutomationError> {
        let mut inner = self.inner.lock().await;
        if let Some(engine) = inner.engine.take() {
            engine.close().await?;
        }
        inner.state = SessionState::Closed;
        Ok(())
    }
}

/// Ordered authentication check: the URL verdict outranks element evidence,
/// and a visible login control outranks the user-menu check.
pub async fn detect_authentication(
    config: &HostConfig,
    engine: &Arc<dyn BrowserEngine>,
    chains: &Arc<ChainTable>,
) -> AuthState {
    let url = match engine.current_url().await {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "could not read current URL");
            return AuthState::Unknown;
        }
    };
    if config.is_login_url(&url) {
        return AuthState::Unauthenticated;
    }

    let locator = Locator::new(engine.clone(), chains.clone());
    if locator.locate(crate::selector::Role::LoginControl).await.is_some() {
        return AuthState::Unauthenticated;
    }
    if locator.locate(crate::selector::Role::UserMenu).await.is_some() {
        return AuthState::Authenticated;
    }
    if config.in_domain(&url) {
        debug!(%url, "no auth markers found, treating in-domain page as authenticated");
        return AuthState::Authenticated;
    }
    AuthState::Unknown
}

/// Fixed-length settle wait for UI that re-renders without any observable
/// completion signal. Honors tokio's paused clock under test.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
