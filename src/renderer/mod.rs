//! Renderer handle boundary
//!
//! The crawler never drives a browser directly. It talks to an opaque session
//! that can load a URL, evaluate script (to measure and move the scroll
//! position), send a key press and hand back the current markup. The
//! [`webdriver`] module implements that session over the W3C WebDriver wire
//! protocol; tests substitute scripted in-memory sessions.

mod webdriver;

pub use webdriver::{WebDriverFactory, WebDriverSession};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a renderer session
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP error talking to renderer: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Renderer rejected {command}: {error}: {message}")]
    Protocol {
        command: String,
        error: String,
        message: String,
    },

    #[error("Unexpected renderer response to {command}: {detail}")]
    UnexpectedResponse { command: String, detail: String },

    #[error("Renderer session is closed")]
    SessionClosed,
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Keys the crawler may press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    End,
    Home,
    PageDown,
    PageUp,
}

impl Key {
    /// WebDriver code point for this key
    pub fn code_point(&self) -> char {
        match self {
            Self::PageUp => '\u{E00E}',
            Self::PageDown => '\u{E00F}',
            Self::End => '\u{E010}',
            Self::Home => '\u{E011}',
        }
    }
}

/// One live rendering session
///
/// Any failing call surfaces as a [`RenderError`]; the crawl loop treats those
/// as fatal for the current run.
#[async_trait]
pub trait Renderer: Send {
    /// Loads `url` in the session
    async fn navigate(&mut self, url: &str) -> RenderResult<()>;

    /// Returns the currently rendered document markup
    async fn current_markup(&mut self) -> RenderResult<String>;

    /// Evaluates a script body (`return ...;`) and returns its JSON value
    async fn script_eval(&mut self, script: &str) -> RenderResult<Value>;

    /// Presses and releases a single key
    async fn send_key(&mut self, key: Key) -> RenderResult<()>;

    /// Releases the session; calling it twice is a no-op
    async fn close(&mut self) -> RenderResult<()>;
}

/// Opens a fresh renderer session for every crawl run
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn open(&self) -> RenderResult<Box<dyn Renderer>>;
}
