use crate::config::ReplicateConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::profile::ModelConfig;
use crate::response::AGENT_PREFIX;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Anything the shell can send a prompt to.
///
/// Implemented by [`ReplicateClient`]; tests plug in canned backends.
#[allow(async_fn_in_trait)]
pub trait Assistant {
    fn model_id(&self) -> &str;

    /// Attach file content to the next prompt only.
    fn set_file_context(&mut self, content: String);

    /// Returns the answer prefixed with [`AGENT_PREFIX`].
    async fn send_prompt(&mut self, prompt: &str) -> Result<String>;
}

/// Builds an [`Assistant`] for a model entry of the profile.
pub trait Connector {
    type Backend: Assistant;

    fn connect(&self, model: &ModelConfig, token: &str) -> Result<Self::Backend>;
}

/// `owner/name` with an optional pinned `:version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl ModelRef {
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::config("Model configuration is missing the 'id' field."));
        }
        let (path, version) = match id.split_once(':') {
            Some((p, v)) if !v.is_empty() => (p, Some(v.to_string())),
            Some(_) => return Err(Error::config(format!("Model id '{id}' has an empty version"))),
            None => (id, None),
        };
        match path.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    version,
                })
            }
            _ => Err(Error::config(format!(
                "Model id '{id}' must look like 'owner/name' or 'owner/name:version'"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

pub struct ReplicateClient {
    model_id: String,
    model: ModelRef,
    input_key: String,
    token: String,
    base_url: String,
    sync_wait_secs: u64,
    poll_interval: Duration,
    max_wait: Duration,
    file_context: Option<String>,
    http: HttpClient,
}

impl ReplicateClient {
    pub fn new(model: &ModelConfig, token: &str, settings: &ReplicateConfig) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::config(format!(
                "Please set the {} environment variable.",
                settings.api_token_env
            )));
        }
        let model_ref = ModelRef::parse(&model.id)?;
        let http = HttpClient::new("granite-shell/0.1.0", settings.request_timeout_secs)?;
        Ok(Self {
            model_id: model.id.trim().to_string(),
            model: model_ref,
            input_key: model.input_key.clone(),
            token: token.trim().to_string(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            sync_wait_secs: settings.sync_wait_secs,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_wait: Duration::from_secs(settings.max_wait_secs),
            file_context: None,
            http,
        })
    }

    /// Wraps the prompt in the pending file context, consuming it.
    fn build_prompt(&mut self, user_prompt: &str) -> String {
        match self.file_context.take() {
            Some(ctx) => format!(
                "Based on the following file content:\n\n---\n{ctx}\n---\n\nNow, please do the following: {user_prompt}"
            ),
            None => user_prompt.to_string(),
        }
    }

    fn create_request(&self, prompt: &str) -> (String, Value) {
        let mut input = Map::new();
        input.insert(self.input_key.clone(), Value::String(prompt.to_string()));
        match &self.model.version {
            Some(version) => (
                format!("{}/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!(
                    "{}/models/{}/{}/predictions",
                    self.base_url, self.model.owner, self.model.name
                ),
                json!({ "input": input }),
            ),
        }
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let (url, body) = self.create_request(prompt);
        let body = serde_json::to_string(&body)
            .map_err(|e| Error::parse(format!("serialize request: {e}")))?;
        let prefer = format!("wait={}", self.sync_wait_secs);
        let headers: Vec<(&str, &str)> = if self.sync_wait_secs > 0 {
            vec![("Prefer", prefer.as_str())]
        } else {
            Vec::new()
        };

        debug!(model = %self.model_id, "creating prediction");
        let mut prediction: Prediction = self
            .http
            .post_json_authed(&url, &self.token, &body, &headers)
            .await
            .map_err(|e| {
                warn!("Replicate API error: {e}");
                e
            })?;

        let started = Instant::now();
        while !prediction.is_terminal() {
            if started.elapsed() >= self.max_wait {
                return Err(Error::prediction(
                    &prediction.id,
                    &prediction.status,
                    format!("still running after {}s", self.max_wait.as_secs()),
                ));
            }
            sleep(self.poll_interval).await;
            let poll_url = format!("{}/predictions/{}", self.base_url, prediction.id);
            prediction = self.http.get_json_authed(&poll_url, &self.token).await?;
            debug!(id = %prediction.id, status = %prediction.status, "polled prediction");
        }

        if prediction.status != "succeeded" {
            let message = match &prediction.error {
                Value::Null => "no error detail".to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(Error::prediction(prediction.id, prediction.status, message));
        }

        info!(id = %prediction.id, elapsed_ms = started.elapsed().as_millis() as u64, "prediction succeeded");
        Ok(join_output(&prediction.output))
    }
}

impl Assistant for ReplicateClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn set_file_context(&mut self, content: String) {
        self.file_context = Some(content);
    }

    async fn send_prompt(&mut self, prompt: &str) -> Result<String> {
        let final_prompt = self.build_prompt(prompt);
        let text = self.run(&final_prompt).await?;
        Ok(format!("{AGENT_PREFIX}{}", text.trim()))
    }
}

/// Language models stream tokens, so output is usually an array of string chunks.
fn join_output(output: &Value) -> String {
    match output {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => other.to_string(),
    }
}

pub struct ReplicateConnector {
    settings: ReplicateConfig,
}

impl ReplicateConnector {
    pub fn new(settings: ReplicateConfig) -> Self {
        Self { settings }
    }
}

impl Connector for ReplicateConnector {
    type Backend = ReplicateClient;

    fn connect(&self, model: &ModelConfig, token: &str) -> Result<ReplicateClient> {
        ReplicateClient::new(model, token, &self.settings)
    }
}
