use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Evidence source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Browser session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine error: {0}")]
    EngineError(String),
}
