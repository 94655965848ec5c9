use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;

/// Represents one way to match a live element in the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// A raw CSS selector.
    Css(String),
    /// Match on the `data-testid` attribute.
    TestId(String),
    /// Elements of `tag` whose visible text contains `needle`, case-insensitive.
    Text { tag: String, needle: String },
    /// Elements of `tag` whose `aria-label` contains `needle`, case-insensitive.
    AriaLabel { tag: String, needle: String },
    /// Inputs and textareas whose placeholder contains the needle, case-insensitive.
    Placeholder(String),
    /// Anchors whose `href` contains the needle.
    Href(String),
    /// Represents an unparseable selector string, with a reason.
    Invalid(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s {
            _ if s.starts_with("css:") => Selector::Css(s["css:".len()..].to_string()),
            _ if s.starts_with("testid:") => Selector::TestId(s["testid:".len()..].to_string()),
            _ if s.starts_with("text:") => match split_tagged(&s["text:".len()..]) {
                Some((tag, needle)) => Selector::Text { tag, needle },
                None => Selector::Invalid(format!(
                    "text selector must be 'text:tag|needle', got \"{s}\""
                )),
            },
            _ if s.starts_with("aria:") => match split_tagged(&s["aria:".len()..]) {
                Some((tag, needle)) => Selector::AriaLabel { tag, needle },
                None => Selector::Invalid(format!(
                    "aria selector must be 'aria:tag|needle', got \"{s}\""
                )),
            },
            _ if s.starts_with("placeholder:") => {
                Selector::Placeholder(s["placeholder:".len()..].to_string())
            }
            _ if s.starts_with("href:") => Selector::Href(s["href:".len()..].to_string()),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes 'css:', 'testid:', 'text:', 'aria:', 'placeholder:' or 'href:'."
            )),
        }
    }
}

fn split_tagged(s: &str) -> Option<(String, String)> {
    let (tag, needle) = s.split_once('|')?;
    let tag = tag.trim();
    let needle = needle.trim();
    if tag.is_empty() || needle.is_empty() {
        return None;
    }
    Some((tag.to_string(), needle.to_string()))
}

/// Embeds a Rust string as a JavaScript string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

impl Selector {
    /// Compiles the selector to a JavaScript expression evaluating to an
    /// array of the elements it currently matches.
    pub fn to_js_array(&self) -> String {
        match self {
            Selector::Css(q) => format!("Array.from(document.querySelectorAll({}))", js_str(q)),
            Selector::TestId(v) => format!(
                "Array.from(document.querySelectorAll('[data-testid=' + JSON.stringify({}) + ']'))",
                js_str(v)
            ),
            Selector::Text { tag, needle } => format!(
                "Array.from(document.querySelectorAll({})).filter(e => (e.textContent || '').toLowerCase().includes({}))",
                js_str(tag),
                js_str(&needle.to_lowercase())
            ),
            Selector::AriaLabel { tag, needle } => format!(
                "Array.from(document.querySelectorAll({})).filter(e => (e.getAttribute('aria-label') || '').toLowerCase().includes({}))",
                js_str(tag),
                js_str(&needle.to_lowercase())
            ),
            Selector::Placeholder(needle) => format!(
                "Array.from(document.querySelectorAll('input, textarea')).filter(e => (e.getAttribute('placeholder') || '').toLowerCase().includes({}))",
                js_str(&needle.to_lowercase())
            ),
            Selector::Href(needle) => format!(
                "Array.from(document.querySelectorAll('a[href]')).filter(e => (e.getAttribute('href') || '').includes({}))",
                js_str(needle)
            ),
            Selector::Invalid(_) => "[]".to_string(),
        }
    }
}

/// A semantic role the automation flows look up instead of hard-coding
/// selector strings at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Any "log in / sign in" control; its presence means unauthenticated.
    LoginControl,
    /// The user/profile menu; its presence means authenticated.
    UserMenu,
    /// A project card or link on the listing page.
    ProjectCard,
    /// The title element of an open project page.
    ProjectTitle,
    /// The control that opens the add-entry form.
    AddEntryAction,
    /// The entry form's title field.
    TitleField,
    /// The entry form's body field.
    BodyField,
    /// The entry form's submit control.
    SubmitAction,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::LoginControl,
        Role::UserMenu,
        Role::ProjectCard,
        Role::ProjectTitle,
        Role::AddEntryAction,
        Role::TitleField,
        Role::BodyField,
        Role::SubmitAction,
    ];
}

/// Declarative map from a semantic role to its ordered fallback chain.
///
/// Static configuration: the chains are built once at startup and validated,
/// rather than living as literal string lists scattered through the flows.
/// The host UI is volatile, so every role carries several strategies, tried
/// strictly in declared order.
#[derive(Debug, Clone)]
pub struct ChainTable {
    chains: BTreeMap<Role, Vec<Selector>>,
}

impl Default for ChainTable {
    fn default() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(
            Role::LoginControl,
            vec![
                Selector::Text { tag: "button".into(), needle: "log in".into() },
                Selector::Text { tag: "button".into(), needle: "sign in".into() },
                Selector::Text { tag: "a".into(), needle: "log in".into() },
                Selector::Text { tag: "a".into(), needle: "sign in".into() },
                Selector::TestId("login-button".into()),
            ],
        );
        chains.insert(
            Role::UserMenu,
            vec![
                Selector::TestId("user-menu".into()),
                Selector::AriaLabel { tag: "button".into(), needle: "user".into() },
                Selector::AriaLabel { tag: "button".into(), needle: "profile".into() },
                Selector::Css(".user-menu".into()),
                Selector::Css(".profile-menu".into()),
            ],
        );
        chains.insert(
            Role::ProjectCard,
            vec![
                Selector::TestId("project-card".into()),
                Selector::Css(".project-item".into()),
                Selector::Href("/project/".into()),
                Selector::Css("[class*=\"project\"]".into()),
            ],
        );
        chains.insert(
            Role::ProjectTitle,
            vec![
                Selector::Css("h1".into()),
                Selector::TestId("project-title".into()),
                Selector::Css(".project-title".into()),
                Selector::Css("[class*=\"title\"]".into()),
            ],
        );
        chains.insert(
            Role::AddEntryAction,
            vec![
                Selector::Text { tag: "button".into(), needle: "add knowledge".into() },
                Selector::Text { tag: "button".into(), needle: "add".into() },
                Selector::Text { tag: "button".into(), needle: "new".into() },
                Selector::TestId("add-knowledge".into()),
                Selector::Css(".add-knowledge-button".into()),
            ],
        );
        chains.insert(
            Role::TitleField,
            vec![
                Selector::Css("input[name=\"title\"]".into()),
                Selector::Placeholder("title".into()),
                Selector::Css("input[type=\"text\"]".into()),
            ],
        );
        chains.insert(
            Role::BodyField,
            vec![
                Selector::Css("textarea[name=\"content\"]".into()),
                Selector::Placeholder("content".into()),
                Selector::Css("textarea".into()),
            ],
        );
        chains.insert(
            Role::SubmitAction,
            vec![
                Selector::Text { tag: "button".into(), needle: "save".into() },
                Selector::Text { tag: "button".into(), needle: "add".into() },
                Selector::Text { tag: "button".into(), needle: "submit".into() },
                Selector::Css("button[type=\"submit\"]".into()),
            ],
        );
        Self { chains }
    }
}

impl ChainTable {
    /// The ordered chain for a role. Empty only for roles a custom table
    /// never registered, which `validate` rejects at startup.
    pub fn chain(&self, role: Role) -> &[Selector] {
        self.chains.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the chain for one role. Used by tests and host-specific
    /// overrides; call `validate` again afterwards.
    pub fn set_chain(&mut self, role: Role, chain: Vec<Selector>) {
        self.chains.insert(role, chain);
    }

    /// Startup validation: every role has a non-empty chain with no
    /// unparseable entries.
    pub fn validate(&self) -> Result<(), AutomationError> {
        for role in Role::ALL {
            let chain = self.chain(role);
            if chain.is_empty() {
                return Err(AutomationError::InvalidSelector(format!(
                    "no selector chain registered for role {role:?}"
                )));
            }
            for selector in chain {
                if let Selector::Invalid(reason) = selector {
                    return Err(AutomationError::InvalidSelector(format!(
                        "{role:?}: {reason}"
                    )));
                }
            }
        }
        Ok(())
    }
}
