use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::agents::specialists::{AgentProfile, REQUIRED_AGENTS};
use crate::registry::Registry;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub registry_path: PathBuf,
    pub agent_timeout: Duration,
    pub default_agent: String,
}

impl AppConfig {
    const REGISTRY_PATH_VARS: [&'static str; 2] =
        ["AGENTS_REGISTRY_PATH", "FOUNDRY_AGENTS_REGISTRY"];
    const TIMEOUT_VARS: [&'static str; 2] = ["AGENT_TIMEOUT_MS", "FOUNDRY_AGENTS_TIMEOUT_MS"];
    const DEFAULT_AGENT_VARS: [&'static str; 1] = ["ROUTING_DEFAULT_AGENT"];

    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

    pub fn from_env() -> anyhow::Result<Self> {
        let registry_path = read_env(&Self::REGISTRY_PATH_VARS)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Registry::DEFAULT_FILE));

        let timeout_ms = match read_env(&Self::TIMEOUT_VARS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("AGENT_TIMEOUT_MS must be milliseconds, got '{raw}'"))?,
            None => Self::DEFAULT_TIMEOUT_MS,
        };

        let default_agent = read_env(&Self::DEFAULT_AGENT_VARS)
            .unwrap_or_else(|| AgentProfile::default_agent().name.to_string());

        let config = Self {
            registry_path,
            agent_timeout: Duration::from_millis(timeout_ms.max(1)),
            default_agent,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if AgentProfile::by_name(&self.default_agent).is_none() {
            bail!(
                "ROUTING_DEFAULT_AGENT '{}' is not a configured agent (expected one of: {})",
                self.default_agent,
                REQUIRED_AGENTS
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from(Registry::DEFAULT_FILE),
            agent_timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
            default_agent: AgentProfile::default_agent().name.to_string(),
        }
    }
}

/// Connection settings for the chat-completion backend.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Azure {
        endpoint: String,
        api_key: String,
        deployment: String,
        api_version: String,
    },
    OpenAi {
        api_key: String,
        base_url: Option<String>,
        model: String,
    },
}

impl ProviderConfig {
    /// Resource base URL (`https://<resource>.openai.azure.com`), not an AI Foundry project URL.
    const AZURE_ENDPOINT_VARS: [&'static str; 1] = ["AZURE_OPENAI_ENDPOINT"];
    const AZURE_KEY_VARS: [&'static str; 1] = ["AZURE_OPENAI_API_KEY"];
    const AZURE_DEPLOYMENT_VARS: [&'static str; 2] =
        ["AZURE_OPENAI_DEPLOYMENT", "AZURE_AI_MODEL_DEPLOYMENT_NAME"];
    const AZURE_VERSION_VARS: [&'static str; 1] = ["AZURE_OPENAI_API_VERSION"];
    const OPENAI_KEY_VARS: [&'static str; 1] = ["OPENAI_API_KEY"];
    const OPENAI_BASE_URL_VARS: [&'static str; 1] = ["OPENAI_BASE_URL"];
    const MODEL_VARS: [&'static str; 1] = ["FOUNDRY_AGENTS_MODEL"];

    const DEFAULT_AZURE_API_VERSION: &'static str = "2024-06-01";
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn from_env() -> anyhow::Result<Self> {
        if let Some(endpoint) = read_env(&Self::AZURE_ENDPOINT_VARS) {
            let api_key = read_env(&Self::AZURE_KEY_VARS)
                .context("Set AZURE_OPENAI_API_KEY to use the Azure OpenAI endpoint")?;
            let deployment = read_env(&Self::AZURE_DEPLOYMENT_VARS).context(
                "Set AZURE_OPENAI_DEPLOYMENT (or AZURE_AI_MODEL_DEPLOYMENT_NAME) for Azure OpenAI",
            )?;
            let api_version = read_env(&Self::AZURE_VERSION_VARS)
                .unwrap_or_else(|| Self::DEFAULT_AZURE_API_VERSION.to_string());

            return Ok(Self::Azure {
                endpoint,
                api_key,
                deployment,
                api_version,
            });
        }

        let api_key = read_env(&Self::OPENAI_KEY_VARS).context(
            "Set AZURE_OPENAI_ENDPOINT or OPENAI_API_KEY to reach a chat-completion provider",
        )?;

        Ok(Self::OpenAi {
            api_key,
            base_url: read_env(&Self::OPENAI_BASE_URL_VARS),
            model: read_env(&Self::MODEL_VARS).unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
        })
    }
}

fn read_env(candidates: &[&'static str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|key| env::var(key).ok().filter(|value| !value.trim().is_empty()))
}
