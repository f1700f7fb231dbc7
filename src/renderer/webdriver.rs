//! WebDriver renderer implementation
//!
//! This module speaks the W3C WebDriver wire protocol to an already running
//! driver (chromedriver, geckodriver or a Selenium grid):
//! - `POST /session` opens a session with the configured capabilities
//! - `POST /session/{id}/url` navigates
//! - `GET /session/{id}/source` reads the rendered markup
//! - `POST /session/{id}/execute/sync` evaluates script
//! - `POST /session/{id}/actions` presses keys
//! - `DELETE /session/{id}` releases the browser
//!
//! Launching the driver itself is left to the operator.

use crate::config::RendererConfig;
use crate::renderer::{Key, RenderError, RenderResult, Renderer, RendererFactory};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// Opens WebDriver sessions against a configured endpoint
pub struct WebDriverFactory {
    client: Client,
    base_url: String,
    capabilities: Value,
}

impl WebDriverFactory {
    /// Builds a factory from renderer configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use feed_harvester::config::RendererConfig;
    /// use feed_harvester::renderer::WebDriverFactory;
    ///
    /// let factory = WebDriverFactory::new(&RendererConfig::default()).unwrap();
    /// ```
    pub fn new(config: &RendererConfig) -> RenderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.command_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
            capabilities: build_capabilities(config),
        })
    }
}

#[async_trait]
impl RendererFactory for WebDriverFactory {
    async fn open(&self) -> RenderResult<Box<dyn Renderer>> {
        let endpoint = format!("{}/session", self.base_url);
        let body = json!({ "capabilities": { "alwaysMatch": self.capabilities } });

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let value = decode_response("new session", response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| RenderError::UnexpectedResponse {
                command: "new session".to_string(),
                detail: "missing sessionId".to_string(),
            })?
            .to_string();

        tracing::info!("Opened WebDriver session {}", session_id);

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, session_id),
            session_id,
            closed: false,
        }))
    }
}

/// A live WebDriver session
pub struct WebDriverSession {
    client: Client,
    session_url: String,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn ensure_open(&self) -> RenderResult<()> {
        if self.closed {
            return Err(RenderError::SessionClosed);
        }
        Ok(())
    }

    async fn post(&self, command: &str, path: &str, body: Value) -> RenderResult<Value> {
        self.ensure_open()?;
        let response = self
            .client
            .post(format!("{}/{}", self.session_url, path))
            .json(&body)
            .send()
            .await?;
        decode_response(command, response).await
    }
}

#[async_trait]
impl Renderer for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> RenderResult<()> {
        tracing::debug!("Navigating to {}", url);
        self.post("navigate", "url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_markup(&mut self) -> RenderResult<String> {
        self.ensure_open()?;
        let response = self
            .client
            .get(format!("{}/source", self.session_url))
            .send()
            .await?;
        let value = decode_response("page source", response).await?;

        match value {
            Value::String(markup) => Ok(markup),
            other => Err(RenderError::UnexpectedResponse {
                command: "page source".to_string(),
                detail: format!("expected a string, got {}", other),
            }),
        }
    }

    async fn script_eval(&mut self, script: &str) -> RenderResult<Value> {
        self.post(
            "execute script",
            "execute/sync",
            json!({ "script": script, "args": [] }),
        )
        .await
    }

    async fn send_key(&mut self, key: Key) -> RenderResult<()> {
        let code = key.code_point().to_string();
        let actions = json!({
            "actions": [{
                "type": "key",
                "id": "keyboard",
                "actions": [
                    { "type": "keyDown", "value": code },
                    { "type": "keyUp", "value": code }
                ]
            }]
        });
        self.post("perform actions", "actions", actions).await?;

        // Release input state so the next action chain starts clean
        self.ensure_open()?;
        let response = self
            .client
            .delete(format!("{}/actions", self.session_url))
            .send()
            .await?;
        decode_response("release actions", response).await?;
        Ok(())
    }

    async fn close(&mut self) -> RenderResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let response = self.client.delete(&self.session_url).send().await?;
        decode_response("delete session", response).await?;
        tracing::info!("Closed WebDriver session {}", self.session_id);
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        // Fire-and-forget release on paths that skipped close()
        let client = self.client.clone();
        let url = std::mem::take(&mut self.session_url);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.delete(&url).send().await {
                        tracing::warn!("Dropped WebDriver session cleanup failed: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    "WebDriver session {} dropped without close and no runtime to release it",
                    self.session_id
                );
            }
        }
    }
}

/// Builds the `alwaysMatch` capabilities for the configured browser
fn build_capabilities(config: &RendererConfig) -> Value {
    let browser = config.browser.to_ascii_lowercase();
    let mut capabilities = json!({ "browserName": browser });

    match browser.as_str() {
        "chrome" | "chromium" | "msedge" => {
            let mut args = vec!["--mute-audio".to_string()];
            if config.headless {
                args.push("--headless=new".to_string());
            }
            if let Some(ua) = &config.user_agent {
                args.push(format!("--user-agent={}", ua));
            }
            let options_key = if browser == "msedge" {
                "ms:edgeOptions"
            } else {
                "goog:chromeOptions"
            };
            capabilities[options_key] = json!({ "args": args });
        }
        "firefox" => {
            let mut options = json!({ "args": [] });
            if config.headless {
                options["args"] = json!(["-headless"]);
            }
            if let Some(ua) = &config.user_agent {
                options["prefs"] = json!({ "general.useragent.override": ua });
            }
            capabilities["moz:firefoxOptions"] = options;
        }
        _ => {}
    }

    capabilities
}

/// Unwraps the `value` member of a WebDriver response
///
/// Error responses carry `{"value": {"error": ..., "message": ...}}` with a
/// non-2xx status.
async fn decode_response(command: &str, response: Response) -> RenderResult<Value> {
    let status = response.status();
    let text = response.text().await?;

    let mut body: Value =
        serde_json::from_str(&text).map_err(|e| RenderError::UnexpectedResponse {
            command: command.to_string(),
            detail: format!("HTTP {} with non-JSON body ({}): {}", status.as_u16(), e, truncate(&text)),
        })?;

    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(RenderError::Protocol {
            command: command.to_string(),
            error,
            message,
        });
    }

    Ok(value)
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
