use std::path::Path;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::agents::specialists::{AgentProfile, REQUIRED_AGENTS};
use crate::agents::{Agent, AgentRequest, Reply};
use crate::config::AppConfig;
use crate::error::{AgentFailure, AllAgentsFailed, CoordinatorError, ProviderError};
use crate::llm_client::SharedChatProvider;
use crate::registry::{AgentRecord, Registry};

use super::router::{Classifier, RoutingDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Ready,
}

/// Owns the agent registry and the live agents; routes each query and assembles the replies.
pub struct Coordinator {
    config: AppConfig,
    provider: SharedChatProvider,
    classifier: Classifier,
    registry: Mutex<Option<Registry>>,
    /// Live agents in reply priority order.
    agents: Vec<Agent>,
    state: CoordinatorState,
}

impl Coordinator {
    pub const SYSTEM_LABEL: &'static str = "Coordinator";

    pub fn new(config: AppConfig, provider: SharedChatProvider) -> Self {
        let classifier = Classifier::new(config.default_agent.clone());
        Self {
            config,
            provider,
            classifier,
            registry: Mutex::new(None),
            agents: Vec::new(),
            state: CoordinatorState::Uninitialized,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn registry_path(&self) -> &Path {
        &self.config.registry_path
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    /// Load the registry and make sure every required agent exists.
    #[instrument(skip_all, fields(registry = %self.config.registry_path.display()))]
    pub async fn start(&mut self) -> Result<(), CoordinatorError> {
        let registry = Registry::load(&self.config.registry_path)?;
        *self.registry.lock().await = Some(registry);

        for profile in REQUIRED_AGENTS {
            self.ensure_agent(profile).await?;
        }

        self.state = CoordinatorState::Ready;
        info!(agents = self.agents.len(), "Multi-agent system ready");
        Ok(())
    }

    /// Create (or reuse) the agent for `profile` and install it in priority order.
    pub async fn ensure_agent(
        &mut self,
        profile: &'static AgentProfile,
    ) -> Result<&Agent, CoordinatorError> {
        let record = {
            let mut guard = self.registry.lock().await;
            if guard.is_none() {
                *guard = Some(Registry::load(&self.config.registry_path)?);
            }
            let Some(registry) = guard.as_mut() else {
                return Err(CoordinatorError::NotReady);
            };
            Agent::create(registry, &self.provider, profile).await?
        };

        let agent = Agent::new(
            profile,
            record,
            self.provider.clone(),
            self.config.agent_timeout,
        );
        let rank = |name: &str| REQUIRED_AGENTS.iter().position(|p| p.name == name);

        let index = match self.agents.iter().position(|a| a.name() == profile.name) {
            Some(existing) => {
                self.agents[existing] = agent;
                existing
            }
            None => {
                let slot = self
                    .agents
                    .iter()
                    .position(|a| rank(a.name()) > rank(profile.name))
                    .unwrap_or(self.agents.len());
                self.agents.insert(slot, agent);
                slot
            }
        };
        Ok(&self.agents[index])
    }

    /// Current registry contents, in name order.
    pub async fn registry_snapshot(&self) -> Vec<AgentRecord> {
        self.registry
            .lock()
            .await
            .as_ref()
            .map(|registry| registry.records().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn handle(&self, text: &str) -> Result<Vec<Reply>, CoordinatorError> {
        let decision = self.classifier.classify(text);
        debug!(
            reason = %decision.reason,
            targets = ?decision.targets,
            rationale = %decision.rationale,
            "Routing decision"
        );
        self.dispatch(text, &decision).await
    }

    /// Ask every targeted agent concurrently and return their replies in priority order.
    ///
    /// A failing agent never cancels the others. If some agents fail their replies are
    /// degraded; if all fail the whole query fails.
    #[instrument(skip_all, fields(input = %text, targets = decision.targets.len()))]
    pub async fn dispatch(
        &self,
        text: &str,
        decision: &RoutingDecision,
    ) -> Result<Vec<Reply>, CoordinatorError> {
        if self.state != CoordinatorState::Ready {
            return Err(CoordinatorError::NotReady);
        }

        let selected: Vec<&Agent> = self
            .agents
            .iter()
            .filter(|agent| decision.targets.iter().any(|t| t == agent.name()))
            .collect();
        let missing: Vec<&str> = decision
            .targets
            .iter()
            .map(String::as_str)
            .filter(|target| !selected.iter().any(|agent| agent.name() == *target))
            .collect();

        if selected.is_empty() {
            warn!(targets = ?decision.targets, "No live agent matches the routing decision");
            return Ok(vec![Reply::degraded(
                Self::SYSTEM_LABEL,
                format!(
                    "No matching agent is available for this request (wanted: {}).",
                    decision.targets.join(", ")
                ),
            )]);
        }

        let request = if selected.len() > 1 {
            AgentRequest::joint(text)
        } else {
            AgentRequest::new(text)
        };

        let outcomes = join_all(selected.iter().map(|agent| agent.answer(&request))).await;

        let mut replies = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (agent, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                Ok(text) => replies.push(Reply::answered(agent.name(), text)),
                Err(error) => {
                    warn!(agent = agent.name(), %error, retryable = error.retryable(), "Agent call failed");
                    replies.push(Reply::degraded(agent.name(), describe_failure(&error)));
                    failures.push(AgentFailure {
                        agent: agent.name().to_string(),
                        error,
                    });
                }
            }
        }

        if failures.len() == selected.len() {
            return Err(AllAgentsFailed { failures }.into());
        }

        if !missing.is_empty() {
            warn!(missing = ?missing, "Some routed agents are not live");
            replies.extend(missing.into_iter().map(|name| {
                Reply::degraded(name, "This agent is not available right now.")
            }));
        }
        Ok(replies)
    }
}

fn describe_failure(error: &ProviderError) -> String {
    let hint = if error.retryable() {
        "This looks temporary; try again shortly."
    } else {
        "Check the provider configuration."
    };
    format!("This agent could not answer: {error}. {hint}")
}
