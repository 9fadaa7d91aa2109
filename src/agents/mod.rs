pub mod agent;
pub mod specialists;
pub mod traits;

pub use agent::Agent;
pub use traits::{AgentRequest, Reply};
