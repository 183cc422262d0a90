use std::time::Duration;

use reqwest::blocking::Client;

pub const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: Role,
    pub message: String,
}

impl Content {
    pub fn new(role: Role, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
        }
    }
}

/// Model parameters forwarded untouched to the completion service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: None,
            max_retries: 2,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn fill_default_value(&mut self) {
        if self.model_id.trim().is_empty() {
            self.model_id = DEFAULT_MODEL.to_string();
        }
        if self.base_url.trim().is_empty() {
            self.base_url = DEFAULT_BASE_URL.to_string();
        }
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        if self.api_key_env.trim().is_empty() {
            self.api_key_env = DEFAULT_API_KEY_ENV.to_string();
        }
    }
}

/// One request to the completion service: persona framing, optional prior
/// turns, and the new user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<Content>,
    pub user_message: String,
}

impl CompletionRequest {
    pub fn messages(&self) -> Vec<Content> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Content::new(Role::System, self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages.push(Content::new(Role::User, self.user_message.clone()));
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("API key not found, set the `{0}` environment variable")]
    MissingCredentials(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => CompletionError::Auth { status, message },
            429 => CompletionError::RateLimited(message),
            _ => CompletionError::Api { status, message },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Timeout
            | CompletionError::Network(_)
            | CompletionError::RateLimited(_) => true,
            CompletionError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if err.is_decode() {
            CompletionError::MalformedResponse(err.to_string())
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

/// The hosted text-generation backend, consumed as a black box.
pub trait CompletionService {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the Groq chat-completions endpoint (OpenAI compatible).
pub struct GroqClient {
    client: Client,
    config: ModelConfig,
    api_key: Option<String>,
    retry_backoff: Duration,
}

impl GroqClient {
    pub fn new(config: ModelConfig, api_key: Option<String>) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            config,
            api_key,
            retry_backoff: RETRY_BACKOFF,
        })
    }

    /// Reads the API key once from the environment variable named in the config.
    pub fn from_env(config: ModelConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            log::warn!("`{}` is not set, requests will fail", config.api_key_env);
        }
        Self::new(config, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn request_body<'a>(&'a self, messages: &'a [Content]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model_id,
            messages: messages
                .iter()
                .map(|c| ChatMessage {
                    role: c.role.as_ref(),
                    content: &c.message,
                })
                .collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn send_once(&self, api_key: &str, body: &ChatRequest<'_>) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(CompletionError::from_status(
                status.as_u16(),
                error_message(&text),
            ));
        }
        parse_reply(&text)
    }
}

impl CompletionService for GroqClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::MissingCredentials(self.config.api_key_env.clone()))?;

        let messages = request.messages();
        let body = self.request_body(&messages);
        log::debug!(
            "request body:\n{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let mut attempt = 0;
        loop {
            match self.send_once(api_key, &body) {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.retry_backoff * (1 << attempt.min(6));
                    log::warn!("completion attempt {attempt} failed: {err}, retrying in {backoff:?}");
                    std::thread::sleep(backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn parse_reply(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::MalformedResponse("response has no message content".into()))
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Answers each connection with the next scripted `(status, body)`,
    /// repeating the last one. Returns the base url and a request counter.
    fn serve(script: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script[n.min(script.len() - 1)];

                let mut reader = BufReader::new(stream);
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }
                let mut request_body = vec![0; content_length];
                let _ = reader.read_exact(&mut request_body);

                let mut stream = reader.into_inner();
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.flush();
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn local_client(base_url: String, max_retries: u32) -> GroqClient {
        GroqClient {
            client: Client::builder().no_proxy().build().unwrap(),
            config: ModelConfig {
                base_url,
                max_retries,
                ..ModelConfig::default()
            },
            api_key: Some("key".into()),
            retry_backoff: Duration::from_millis(1),
        }
    }

    const BUSY: &str = r#"{"error":{"message":"over capacity"}}"#;
    const REPLY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"Veni, vidi."}}]}"#;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are Cleopatra VII.".to_string(),
            history: vec![],
            user_message: "Who are you?".to_string(),
        }
    }

    #[test]
    fn messages_put_system_prompt_first() {
        let mut request = request();
        request.history = vec![
            Content::new(Role::User, "Hello"),
            Content::new(Role::Assistant, "Greetings"),
        ];

        let roles: Vec<Role> = request.messages().into_iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.messages().last().unwrap().message, "Who are you?");
    }

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let client = GroqClient::new(ModelConfig::default(), Some("key".into())).unwrap();
        let messages = request().messages();
        let body = serde_json::to_value(client.request_body(&messages)).unwrap();

        assert_eq!(body["model"], "mixtral-8x7b-32768");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are Cleopatra VII.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("max_tokens").is_none());
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn max_tokens_is_sent_when_configured() {
        let config = ModelConfig {
            max_tokens: Some(256),
            ..ModelConfig::default()
        };
        let client = GroqClient::new(config, Some("key".into())).unwrap();
        let messages = request().messages();
        let body = serde_json::to_value(client.request_body(&messages)).unwrap();
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn missing_key_fails_without_network() {
        let client = GroqClient::new(ModelConfig::default(), None).unwrap();
        let err = client.complete(&request()).unwrap_err();
        assert_eq!(
            err,
            CompletionError::MissingCredentials("GROQ_API_KEY".to_string())
        );
    }

    #[test]
    fn parse_reply_reads_first_choice() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"I am Cleopatra."}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "I am Cleopatra.");
    }

    #[test]
    fn parse_reply_rejects_empty_choices_and_garbage() {
        assert!(matches!(
            parse_reply(r#"{"choices":[]}"#),
            Err(CompletionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_reply("<html>bad gateway</html>"),
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(
            CompletionError::from_status(401, "no".into()),
            CompletionError::Auth { status: 401, .. }
        ));
        assert!(CompletionError::from_status(429, "slow down".into()).is_retryable());
        assert!(CompletionError::from_status(503, "busy".into()).is_retryable());
        assert!(!CompletionError::from_status(400, "bad".into()).is_retryable());
        assert!(!CompletionError::from_status(403, "no".into()).is_retryable());
    }

    #[test]
    fn error_message_prefers_api_envelope() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Invalid API Key");
        assert_eq!(error_message("  "), "empty response body");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn fill_default_value_repairs_blank_fields() {
        let mut config = ModelConfig {
            model_id: " ".into(),
            base_url: "https://example.test/v1//".into(),
            api_key_env: String::new(),
            ..ModelConfig::default()
        };
        config.fill_default_value();
        assert_eq!(config.model_id, DEFAULT_MODEL);
        assert_eq!(config.base_url, "https://example.test/v1");
        assert_eq!(config.api_key_env, DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn server_errors_are_retried_up_to_max_retries() {
        let (base_url, hits) = serve(vec![(503, BUSY)]);
        let err = local_client(base_url, 2).complete(&request()).unwrap_err();

        assert_eq!(
            err,
            CompletionError::Api {
                status: 503,
                message: "over capacity".into()
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_stops_at_first_success() {
        let (base_url, hits) = serve(vec![(503, BUSY), (429, BUSY), (200, REPLY)]);
        let reply = local_client(base_url, 2).complete(&request()).unwrap();

        assert_eq!(reply, "Veni, vidi.");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn auth_errors_are_not_retried() {
        let (base_url, hits) = serve(vec![(401, r#"{"error":{"message":"Invalid API Key"}}"#)]);
        let err = local_client(base_url, 2).complete(&request()).unwrap_err();

        assert!(matches!(err, CompletionError::Auth { status: 401, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_retries_means_a_single_attempt() {
        let (base_url, hits) = serve(vec![(500, BUSY)]);
        let err = local_client(base_url, 0).complete(&request()).unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
