use std::sync::Arc;

use tracing::debug;

use crate::engine::BrowserEngine;
use crate::errors::AutomationError;
use crate::selector::{ChainTable, Role, Selector};

/// A handle to the element that won a role's selector chain.
///
/// The handle re-resolves its selector on every action; the host UI is
/// volatile and a cached node would go stale anyway.
#[derive(Clone)]
pub struct ElementHandle {
    engine: Arc<dyn BrowserEngine>,
    selector: Selector,
}

impl ElementHandle {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub async fn click(&self) -> Result<(), AutomationError> {
        self.engine.click(&self.selector).await
    }

    pub async fn fill(&self, text: &str) -> Result<(), AutomationError> {
        self.engine.fill(&self.selector, text).await
    }

    pub async fn text(&self) -> Result<String, AutomationError> {
        self.engine.text_of(&self.selector).await
    }
}

/// Resolves semantic roles to live elements by walking each role's selector
/// chain strictly in declared order.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn BrowserEngine>,
    chains: Arc<ChainTable>,
}

impl Locator {
    pub fn new(engine: Arc<dyn BrowserEngine>, chains: Arc<ChainTable>) -> Self {
        Self { engine, chains }
    }

    pub fn chains(&self) -> &ChainTable {
        &self.chains
    }

    /// The first chain entry with at least one live match wins.
    ///
    /// "Not found" is a normal outcome given UI volatility, so the chain
    /// being exhausted yields `None` rather than an error, and a per-entry
    /// engine failure counts as a non-match for that entry only.
    pub async fn locate(&self, role: Role) -> Option<ElementHandle> {
        for selector in self.chains.chain(role) {
            match self.engine.count(selector).await {
                Ok(n) if n > 0 => {
                    debug!(?role, %selector, matches = n, "selector chain entry matched");
                    return Some(ElementHandle {
                        engine: self.engine.clone(),
                        selector: selector.clone(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(?role, %selector, error = %e, "selector chain entry failed, trying next");
                }
            }
        }
        debug!(?role, "selector chain exhausted with no match");
        None
    }
}
