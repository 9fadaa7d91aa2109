use serde::{Deserialize, Serialize};

/// Structured payload for one turn sent to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub input: String,
    /// Set when the same query is fanned out to several agents.
    #[serde(default)]
    pub joint: bool,
}

impl AgentRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            joint: false,
        }
    }

    pub fn joint(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            joint: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Answered,
    /// The agent failed; the text explains why.
    Degraded,
}

/// One agent's labeled answer to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub agent: String,
    pub text: String,
    pub status: ReplyStatus,
}

impl Reply {
    pub fn answered(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            text: text.into(),
            status: ReplyStatus::Answered,
        }
    }

    pub fn degraded(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            text: text.into(),
            status: ReplyStatus::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ReplyStatus::Degraded
    }
}
