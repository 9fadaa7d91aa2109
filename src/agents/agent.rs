use std::time::Duration;

use tracing::{info, instrument};

use crate::error::{CoordinatorError, ProviderError, RegistryError};
use crate::llm_client::SharedChatProvider;
use crate::registry::{AgentRecord, Registry};

use super::specialists::AgentProfile;
use super::traits::AgentRequest;

/// Live handle to one provisioned agent.
pub struct Agent {
    profile: &'static AgentProfile,
    record: AgentRecord,
    provider: SharedChatProvider,
    timeout: Duration,
}

impl Agent {
    pub fn new(
        profile: &'static AgentProfile,
        record: AgentRecord,
        provider: SharedChatProvider,
        timeout: Duration,
    ) -> Self {
        Self {
            profile,
            record,
            provider,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &AgentRecord {
        &self.record
    }

    /// Return the registered record for `profile`, provisioning and persisting it first if needed.
    ///
    /// An existing record is reused without touching the provider. If its instructions no longer
    /// match the profile the call fails rather than serving a stale agent.
    pub async fn create(
        registry: &mut Registry,
        provider: &SharedChatProvider,
        profile: &AgentProfile,
    ) -> Result<AgentRecord, CoordinatorError> {
        if let Some(existing) = registry.lookup(profile.name) {
            if existing.instructions != profile.instructions {
                return Err(RegistryError::DuplicateName {
                    name: profile.name.to_string(),
                }
                .into());
            }
            info!(agent = profile.name, "Agent found in registry");
            return Ok(existing.clone());
        }

        info!(agent = profile.name, "Creating new agent");
        let external_id = provider
            .create_agent(profile.name, profile.instructions)
            .await
            .map_err(|source| CoordinatorError::AgentCreation {
                name: profile.name.to_string(),
                source,
            })?;

        let record = AgentRecord::new(
            profile.name,
            profile.instructions,
            profile.role,
            Some(external_id),
        );
        registry.register(record.clone())?;
        Ok(record)
    }

    #[instrument(skip_all, fields(agent = %self.record.name, joint = request.joint))]
    pub async fn answer(&self, request: &AgentRequest) -> Result<String, ProviderError> {
        let prompt = self.profile.compose_prompt(request);
        let text = tokio::time::timeout(self.timeout, self.provider.converse(&self.record, &prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::llm_client::{ChatProvider, EchoProvider};

    #[derive(Default)]
    struct CountingProvider {
        created: AtomicUsize,
    }

    #[async_trait]
    impl ChatProvider for CountingProvider {
        async fn create_agent(&self, name: &str, _: &str) -> Result<String, ProviderError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("{name}-{n}"))
        }

        async fn converse(&self, _: &AgentRecord, text: &str) -> Result<String, ProviderError> {
            match text {
                "blank" => Ok("   ".to_string()),
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok("late".to_string())
                }
                "fail" => Err(ProviderError::request("auth failure", false)),
                other => Ok(format!("re: {other}")),
            }
        }
    }

    fn registry() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::load(dir.path().join("agents_registry.json")).expect("load");
        (dir, registry)
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let (_dir, mut registry) = registry();
        let counting = Arc::new(CountingProvider::default());
        let provider: SharedChatProvider = counting.clone();

        let first = Agent::create(&mut registry, &provider, &AgentProfile::FOOD_EXPERT)
            .await
            .expect("first create");
        let second = Agent::create(&mut registry, &provider, &AgentProfile::FOOD_EXPERT)
            .await
            .expect("second create");

        assert_eq!(first, second);
        assert_eq!(first.external_id.as_deref(), Some("FoodExpertAgent-1"));
        assert_eq!(first.role, "nutrition");
        assert_eq!(counting.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn changed_instructions_conflict_with_the_stored_record() {
        let (_dir, mut registry) = registry();
        let provider: SharedChatProvider = Arc::new(EchoProvider);
        registry
            .register(AgentRecord::new(
                "FoodExpertAgent",
                "an older profile",
                "nutrition",
                Some("echo-FoodExpertAgent".to_string()),
            ))
            .expect("seed");

        let err = Agent::create(&mut registry, &provider, &AgentProfile::FOOD_EXPERT)
            .await
            .expect_err("stale profile");
        assert!(matches!(
            err,
            CoordinatorError::Registry(RegistryError::DuplicateName { .. })
        ));
    }

    fn live_agent(timeout: Duration) -> Agent {
        let record = AgentRecord::new(
            "FoodExpertAgent",
            AgentProfile::FOOD_EXPERT.instructions,
            "nutrition",
            None,
        );
        Agent::new(
            &AgentProfile::FOOD_EXPERT,
            record,
            Arc::new(CountingProvider::default()),
            timeout,
        )
    }

    #[tokio::test]
    async fn answer_passes_provider_text_through() {
        let agent = live_agent(Duration::from_secs(1));
        let text = agent
            .answer(&AgentRequest::new(" protein in eggs "))
            .await
            .expect("answer");
        assert_eq!(text, "re: protein in eggs");
    }

    #[tokio::test]
    async fn blank_answers_are_provider_errors() {
        let agent = live_agent(Duration::from_secs(1));
        let err = agent
            .answer(&AgentRequest::new("blank"))
            .await
            .expect_err("blank");
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn slow_answers_time_out() {
        let agent = live_agent(Duration::from_millis(20));
        let err = agent
            .answer(&AgentRequest::new("slow"))
            .await
            .expect_err("timeout");
        assert!(matches!(err, ProviderError::Timeout(d) if d == Duration::from_millis(20)));
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn provider_failures_surface_unchanged() {
        let agent = live_agent(Duration::from_secs(1));
        let err = agent
            .answer(&AgentRequest::new("fail"))
            .await
            .expect_err("fail");
        assert!(matches!(err, ProviderError::Request { retryable: false, .. }));
    }
}
