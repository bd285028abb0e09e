use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Shown when the agent's reply carries no usable `response` field.
pub const NO_RESPONSE: &str = "No response from agent.";

/// Shown when the endpoint could not be reached at all.
pub const CONNECT_FAILED: &str = "Sorry, I couldn't connect. Please try again.";

const JSON_UTF8: &str = "application/json; charset=utf-8";

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport failure: connect, DNS, TLS or reading the body.
    #[error("could not reach agent: {0}")]
    Connect(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("agent returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl AgentError {
    /// The line appended to the transcript for this failure.
    pub fn transcript_message(&self) -> String {
        match self {
            AgentError::Connect(_) => CONNECT_FAILED.to_string(),
            AgentError::Status { status, body } => {
                format!("Error from server: {} - {}", status, body)
            }
        }
    }
}

#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    endpoint: Url,
}

impl AgentClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    /// Use a preconfigured reqwest client, e.g. one with proxy settings.
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST `{"query": ...}` to the endpoint and return the raw body of a 2xx reply.
    pub async fn send(&self, query: &str) -> Result<String, AgentError> {
        debug!(chars = query.chars().count(), "sending query to agent");

        // `json()` keeps an explicitly set content type
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, JSON_UTF8)
            .json(&QueryRequest { query })
            .send()
            .await
            .map_err(|e| {
                error!("error sending query: {}", e);
                AgentError::Connect(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("error reading agent reply: {}", e);
            AgentError::Connect(e)
        })?;

        if !status.is_success() {
            error!("unsuccessful response: {} - {}", status.as_u16(), body);
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Extract the reply text from a successful body.
///
/// A string `response` is used as is and a missing one (or a body that is
/// not a JSON object) falls back to [`NO_RESPONSE`]. Any other JSON value,
/// an explicit `null` included, is shown as its compact JSON text.
pub fn parse_reply(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!("agent reply is not JSON: {}", e);
            return NO_RESPONSE.to_string();
        }
    };

    match value.get("response") {
        None => NO_RESPONSE.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AgentClient;
    use reqwest::{Client, Url};

    fn local(url: &str) -> AgentClient {
        // Keep test traffic off any proxy configured in the environment
        let client = Client::builder().no_proxy().build().unwrap();
        AgentClient::with_client(client, Url::parse(url).unwrap())
    }

    pub fn client_for(server: &mockito::Server) -> AgentClient {
        local(&format!("{}/exec", server.url()))
    }

    /// An endpoint on a port nothing listens on.
    pub fn unreachable_client() -> AgentClient {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        local(&format!("http://{}/exec", addr))
    }
}
