use super::traits::AgentRequest;

/// Static definition of an agent the coordinator keeps alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: &'static str,
    pub role: &'static str,
    pub instructions: &'static str,
    /// Prefix used when the agent shares a query with other agents.
    pub joint_framing: &'static str,
}

impl AgentProfile {
    pub const FOOD_EXPERT: AgentProfile = AgentProfile {
        name: "FoodExpertAgent",
        role: "nutrition",
        instructions: "You are a Food & Nutrition Expert. Provide accurate nutritional information, calorie content, and ingredient analysis. Be specific and helpful.",
        joint_framing: "Analyze nutrition",
    };

    pub const MEAL_PLANNER: AgentProfile = AgentProfile {
        name: "MealPlanningAgent",
        role: "meal_planning",
        instructions: "You are a Meal Planning Specialist. Suggest healthy meals, recipes, and dietary plans based on user preferences and needs.",
        joint_framing: "Suggest meals for",
    };

    pub fn default_agent() -> &'static AgentProfile {
        &Self::MEAL_PLANNER
    }

    pub fn by_name(name: &str) -> Option<&'static AgentProfile> {
        REQUIRED_AGENTS.iter().find(|profile| profile.name == name)
    }

    pub fn compose_prompt(&self, request: &AgentRequest) -> String {
        let input = request.input.trim();
        if request.joint {
            format!("{}: {input}", self.joint_framing)
        } else {
            input.to_string()
        }
    }
}

/// Agents ensured at startup, in reply priority order.
pub const REQUIRED_AGENTS: &[AgentProfile] = &[AgentProfile::FOOD_EXPERT, AgentProfile::MEAL_PLANNER];
