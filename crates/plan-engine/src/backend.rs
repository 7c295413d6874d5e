//! Action backend abstraction: the live document the engine drives.

use async_trait::async_trait;
use thiserror::Error;
use waypoint_core_types::Observation;

/// Hard failures raised by a backend call (e.g. the page was closed).
/// These are caught at the step-executor boundary and turned into failed
/// step outcomes; they never crash a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("page is gone: {0}")]
    PageGone(String),

    #[error("backend action failed: {0}")]
    Action(String),
}

/// Navigation, clicking, typing, and snapshot capture of a live document.
///
/// Every call is a blocking round-trip from the engine's point of view.
/// Network-level retry/backoff is assumed handled beneath this interface.
#[async_trait]
pub trait ActionBackend: Send + Sync {
    /// Navigate to a URL and wait for the document to load.
    async fn navigate(&self, url: &str) -> Result<(), BackendError>;

    /// Click the element with the given snapshot id.
    async fn click(&self, element_id: u32) -> Result<(), BackendError>;

    /// Type text into the currently focused element.
    async fn type_text(&self, text: &str) -> Result<(), BackendError>;

    /// Submit the currently focused input (Enter keypress).
    async fn submit(&self) -> Result<(), BackendError>;

    /// Capture a fresh observation of the current document.
    async fn snapshot(&self) -> Result<Observation, BackendError>;

    /// Capture a screenshot for the vision oracle.
    async fn screenshot(&self) -> Result<Vec<u8>, BackendError>;
}
