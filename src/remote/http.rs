/*!
 * Blocking HTTP transport bound to one game session
 */

use super::{Transport, TransportError};
use crate::config::document::{ConfigDocument, SECTION_BOT, SECTION_SERVER};
use crate::error::{AgentError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str, user_agent: Option<&str>, cookie: Option<&str>) -> Result<Self> {
        Self::with_timeout(endpoint, user_agent, cookie, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        user_agent: Option<&str>,
        cookie: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| AgentError::Settings(format!("invalid server endpoint {:?}: {}", endpoint, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(agent) = user_agent {
            headers.insert(USER_AGENT, header_value(agent)?);
        }
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, header_value(cookie)?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Settings(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    /// Build from `server.endpoint`, `server.cookie` and `bot.user_agent`
    pub fn from_document(doc: &ConfigDocument) -> Result<Self> {
        let endpoint = doc.get_str(SECTION_SERVER, "endpoint").ok_or_else(|| {
            AgentError::Settings("server.endpoint is not set in the configuration".to_string())
        })?;
        let user_agent = doc
            .get_str(SECTION_BOT, "user_agent")
            .filter(|agent| !agent.trim().is_empty());
        let cookie = doc.get_str(SECTION_SERVER, "cookie");
        Self::new(endpoint, user_agent, cookie)
    }

    /// Absolute URL for a path such as `game.php?screen=overview`
    pub fn resolve(&self, path: &str) -> std::result::Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Network(format!("bad path {:?}: {}", path, e)))
    }
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw.trim())
        .map_err(|e| AgentError::Settings(format!("invalid header value: {}", e)))
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> std::result::Result<String, TransportError> {
        let url = self.resolve(path)?;
        debug!(%url, "GET");

        let response = self.client.get(url).send().map_err(classify)?;
        if !response.status().is_success() {
            return Err(TransportError::Network(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        // Expired sessions get redirected away from game.php
        if !response.url().path().ends_with("game.php") {
            return Err(TransportError::SessionExpired);
        }
        response.text().map_err(classify)
    }
}
