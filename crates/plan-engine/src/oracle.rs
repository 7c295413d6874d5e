//! Oracle abstractions: opaque, blocking text/vision completion functions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use thiserror::Error;

/// Transport-level oracle failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle transport failure: {0}")]
    Transport(String),

    #[error("scripted oracle has no replies left")]
    Exhausted,
}

/// One oracle completion plus its token accounting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleReply {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl OracleReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Text-completion oracle; used both for planning and for resolving a click
/// target to an element id.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<OracleReply, OracleError>;
}

/// Optional vision oracle consulted as a secondary fallback for click
/// targets; same `CLICK(<id>)` reply contract as the executor oracle.
#[async_trait]
pub trait VisionOracle: Send + Sync {
    async fn generate_with_image(
        &self,
        system: &str,
        user: &str,
        image: &[u8],
    ) -> Result<OracleReply, OracleError>;
}

static CLICK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CLICK\s*\(\s*(\d+)\s*\)").expect("click reply pattern"));

/// Parse a `CLICK(<id>)` reply into an element id; `None` when the reply
/// does not follow the contract.
pub fn parse_click_id(text: &str) -> Option<u32> {
    CLICK_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Deterministic queue-backed oracle for tests and offline development.
/// Records every prompt it receives.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn generate(&self, system: &str, user: &str) -> Result<OracleReply, OracleError> {
        self.prompts
            .lock()
            .push((system.to_string(), user.to_string()));
        self.replies
            .lock()
            .pop_front()
            .map(OracleReply::new)
            .ok_or(OracleError::Exhausted)
    }
}

/// Queue-backed vision oracle counting invocations, for fallback-ordering
/// assertions in tests.
pub struct ScriptedVisionOracle {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedVisionOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionOracle for ScriptedVisionOracle {
    async fn generate_with_image(
        &self,
        _system: &str,
        _user: &str,
        _image: &[u8],
    ) -> Result<OracleReply, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .pop_front()
            .map(OracleReply::new)
            .ok_or(OracleError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_click_replies() {
        assert_eq!(parse_click_id("CLICK(42)"), Some(42));
        assert_eq!(parse_click_id("click ( 7 )"), Some(7));
        assert_eq!(parse_click_id("Sure! CLICK(13) is best."), Some(13));
        assert_eq!(parse_click_id("the answer is 42"), None);
        assert_eq!(parse_click_id("CLICK(first)"), None);
    }

    #[tokio::test]
    async fn scripted_oracle_replays_in_order_then_exhausts() {
        let oracle = ScriptedOracle::new(["one", "two"]);
        assert_eq!(oracle.generate("s", "u").await.unwrap().content, "one");
        assert_eq!(oracle.generate("s", "u").await.unwrap().content, "two");
        assert_eq!(oracle.generate("s", "u").await, Err(OracleError::Exhausted));
        assert_eq!(oracle.calls(), 3);
    }

    #[test]
    fn reply_tracks_token_usage() {
        let reply = OracleReply::new("CLICK(1)").with_usage(120, 8);
        assert_eq!(reply.total_tokens(), 128);
    }
}
