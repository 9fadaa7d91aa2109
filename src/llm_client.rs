use std::sync::Arc;

use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client as AsyncOpenAiClient;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::registry::AgentRecord;

pub type SharedChatProvider = Arc<dyn ChatProvider>;

/// External chat capability the agents are built on.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provision an agent with the given profile and return its provider-side id.
    async fn create_agent(&self, name: &str, instructions: &str) -> Result<String, ProviderError>;

    /// Send one user turn to a provisioned agent.
    async fn converse(&self, agent: &AgentRecord, text: &str) -> Result<String, ProviderError>;
}

/// Offline provider that answers every turn by echoing it.
#[derive(Debug, Default, Clone)]
pub struct EchoProvider;

#[async_trait]
impl ChatProvider for EchoProvider {
    async fn create_agent(&self, name: &str, _instructions: &str) -> Result<String, ProviderError> {
        Ok(format!("echo-{name}"))
    }

    async fn converse(&self, agent: &AgentRecord, text: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "[offline {name}]\nI received: {text}\nConnect a chat provider for real answers.",
            name = agent.name
        ))
    }
}

impl EchoProvider {
    pub fn shared() -> SharedChatProvider {
        Arc::new(Self)
    }
}

/// Chat-completion provider for OpenAI, Azure OpenAI, or any OpenAI-compatible backend.
///
/// Chat completions are stateless, so each agent's instructions travel as the system
/// message on every turn and the "created" agent is identified by a profile hash.
pub struct ChatCompletionProvider<C: Config> {
    client: AsyncOpenAiClient<C>,
    model: String,
}

impl<C> ChatCompletionProvider<C>
where
    C: Config + Send + Sync + 'static,
{
    const PROBE: &'static str = "Hello!";
    const TEMPERATURE: f32 = 0.2;

    pub fn new(config: C, model: impl Into<String>) -> Self {
        Self {
            client: AsyncOpenAiClient::with_config(config),
            model: model.into(),
        }
    }

    fn agent_id(name: &str, instructions: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(instructions.as_bytes());
        let hex = hasher.finalize().to_hex();
        format!("chat-{}", &hex[..16])
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn chat(&self, instructions: &str, text: &str) -> Result<String, ProviderError> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(instructions)
            .build()
            .map_err(map_openai_error)?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(text)
            .build()
            .map_err(map_openai_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(Self::TEMPERATURE)
            .messages(vec![system_message.into(), user_message.into()])
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl<C> ChatProvider for ChatCompletionProvider<C>
where
    C: Config + Send + Sync + 'static,
{
    async fn create_agent(&self, name: &str, instructions: &str) -> Result<String, ProviderError> {
        // Probe once so a bad deployment or key fails at startup, not on the first query.
        self.chat(instructions, Self::PROBE).await?;
        let id = Self::agent_id(name, instructions);
        debug!(agent = name, external_id = %id, "Chat agent probe succeeded");
        Ok(id)
    }

    async fn converse(&self, agent: &AgentRecord, text: &str) -> Result<String, ProviderError> {
        self.chat(&agent.instructions, text).await
    }
}

fn map_openai_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(inner) => ProviderError::request(inner.to_string(), true),
        OpenAIError::ApiError(api) => {
            let code = api.code.as_ref().map(|c| c.to_string());
            let kind = api.r#type.as_ref().map(|t| t.to_string()).unwrap_or_default();
            let retryable = is_retryable_api_error(code.as_deref(), &kind);
            ProviderError::Request {
                code,
                message: api.message,
                retryable,
            }
        }
        other => ProviderError::request(other.to_string(), false),
    }
}

fn is_retryable_api_error(code: Option<&str>, kind: &str) -> bool {
    const RETRYABLE: &[&str] = &["rate_limit", "429", "server_error", "overloaded", "timeout"];
    RETRYABLE
        .iter()
        .any(|marker| kind.contains(marker) || code.is_some_and(|c| c.contains(marker)))
}

/// Build the provider selected by the environment, optionally falling back to the echo provider.
pub fn build_provider_from_env(default_to_echo: bool) -> anyhow::Result<SharedChatProvider> {
    match ProviderConfig::from_env() {
        Ok(config) => Ok(build_provider(config)),
        Err(err) if default_to_echo => {
            tracing::warn!(?err, "Falling back to EchoProvider");
            Ok(EchoProvider::shared())
        }
        Err(err) => Err(err),
    }
}

pub fn build_provider(config: ProviderConfig) -> SharedChatProvider {
    match config {
        ProviderConfig::Azure {
            endpoint,
            api_key,
            deployment,
            api_version,
        } => {
            let azure = AzureConfig::new()
                .with_api_base(endpoint)
                .with_api_key(api_key)
                .with_deployment_id(deployment.clone())
                .with_api_version(api_version);
            Arc::new(ChatCompletionProvider::new(azure, deployment))
        }
        ProviderConfig::OpenAi {
            api_key,
            base_url,
            model,
        } => {
            let mut openai = OpenAIConfig::new().with_api_key(api_key);
            if let Some(base_url) = base_url {
                openai = openai.with_api_base(base_url);
            }
            Arc::new(ChatCompletionProvider::new(openai, model))
        }
    }
}
