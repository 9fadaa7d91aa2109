use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agents::specialists::{AgentProfile, REQUIRED_AGENTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// The user asked for every agent with the `both` token.
    Explicit,
    Keyword,
    Default,
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RouteReason::Explicit => "explicit",
            RouteReason::Keyword => "keyword",
            RouteReason::Default => "default",
        };

        write!(f, "{}", label)
    }
}

/// Outcome of classifying one query. `targets` is in reply priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub targets: Vec<String>,
    pub reason: RouteReason,
    pub rationale: String,
    pub matched_keywords: Vec<String>,
}

#[derive(Debug)]
struct RoutingRule {
    agent: &'static str,
    keywords: &'static [&'static str],
    rationale: &'static str,
}

impl RoutingRule {
    const fn new(
        agent: &'static str,
        keywords: &'static [&'static str],
        rationale: &'static str,
    ) -> Self {
        Self {
            agent,
            keywords,
            rationale,
        }
    }

    fn matches(&self, normalized_input: &str) -> Vec<&'static str> {
        self.keywords
            .iter()
            .copied()
            .filter(|keyword| normalized_input.contains(keyword))
            .collect()
    }
}

// Substring matches, so stems cover plurals ("calorie" matches "calories").
const ROUTING_RULES: &[RoutingRule] = &[
    RoutingRule::new(
        AgentProfile::FOOD_EXPERT.name,
        &[
            "calorie",
            "nutrition",
            "nutrient",
            "protein",
            "carb",
            "fat",
            "vitamin",
            "ingredient",
            "analyze",
        ],
        "Request asks about nutrition facts or ingredients",
    ),
    RoutingRule::new(
        AgentProfile::MEAL_PLANNER.name,
        &[
            "suggest",
            "recommend",
            "meal",
            "breakfast",
            "lunch",
            "dinner",
            "recipe",
            "cook",
            "plan",
            "diet",
        ],
        "Request asks for meals, recipes, or a plan",
    ),
];

const BOTH_TOKEN: &str = "both";

/// Pure keyword router from free text to the agents that should answer it.
#[derive(Debug, Clone)]
pub struct Classifier {
    agents: Vec<&'static str>,
    default_agent: String,
}

impl Classifier {
    pub fn new(default_agent: impl Into<String>) -> Self {
        Self {
            agents: REQUIRED_AGENTS.iter().map(|profile| profile.name).collect(),
            default_agent: default_agent.into(),
        }
    }

    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    /// Decision that targets every configured agent.
    pub fn everyone(&self) -> RoutingDecision {
        RoutingDecision {
            targets: self.agents.iter().map(|name| name.to_string()).collect(),
            reason: RouteReason::Explicit,
            rationale: String::from("User asked for every agent"),
            matched_keywords: Vec::new(),
        }
    }

    /// Precedence: an explicit `both` word wins, then every matching keyword family
    /// contributes its agent, and with no match the default agent answers.
    pub fn classify(&self, text: &str) -> RoutingDecision {
        let normalized = text.to_lowercase();

        if contains_word(&normalized, BOTH_TOKEN) {
            let mut decision = self.everyone();
            decision.matched_keywords.push(BOTH_TOKEN.to_string());
            return decision;
        }

        let mut targets = Vec::new();
        let mut matched_keywords = Vec::new();
        let mut rationales = Vec::new();
        for rule in ROUTING_RULES {
            let hits = rule.matches(&normalized);
            if hits.is_empty() {
                continue;
            }
            rationales.push(format!("{} (matched '{}')", rule.rationale, hits.join("', '")));
            matched_keywords.extend(hits.into_iter().map(str::to_string));
            targets.push(rule.agent);
        }

        if targets.is_empty() {
            return RoutingDecision {
                targets: vec![self.default_agent.clone()],
                reason: RouteReason::Default,
                rationale: format!("No routing keyword matched; defaulting to {}", self.default_agent),
                matched_keywords,
            };
        }

        // Rule order and agent priority can differ; replies follow agent priority.
        let targets = self
            .agents
            .iter()
            .filter(|name| targets.contains(*name))
            .map(|name| name.to_string())
            .collect();

        RoutingDecision {
            targets,
            reason: RouteReason::Keyword,
            rationale: rationales.join("; "),
            matched_keywords,
        }
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word)
        .any(|(start, _)| is_keyword_boundary(text, start, word.len()))
}

fn is_keyword_boundary(text: &str, start: usize, len: usize) -> bool {
    let bytes = text.as_bytes();

    let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();

    let after_idx = start + len;
    let after_ok = after_idx >= bytes.len() || !bytes[after_idx].is_ascii_alphanumeric();

    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOD: &str = "FoodExpertAgent";
    const MEAL: &str = "MealPlanningAgent";

    fn classifier() -> Classifier {
        Classifier::new(MEAL)
    }

    fn targets(text: &str) -> Vec<String> {
        classifier().classify(text).targets
    }

    #[test]
    fn nutrition_keywords_route_to_food_expert() {
        for text in [
            "How many calories in a banana?",
            "Is there enough PROTEIN in tofu",
            "vitamins in spinach",
            "analyze these ingredients",
            "carbs vs fat",
        ] {
            assert_eq!(targets(text), vec![FOOD], "{text}");
        }
    }

    #[test]
    fn meal_keywords_route_to_meal_planner() {
        for text in [
            "Suggest a healthy dinner",
            "recipe for lunch",
            "Help me cook breakfast",
            "weekly diet please",
        ] {
            assert_eq!(targets(text), vec![MEAL], "{text}");
        }
    }

    #[test]
    fn both_token_selects_every_agent() {
        let decision = classifier().classify("both, I want to lose weight");
        assert_eq!(decision.targets, vec![FOOD, MEAL]);
        assert_eq!(decision.reason, RouteReason::Explicit);
    }

    #[test]
    fn both_must_be_a_whole_word() {
        let decision = classifier().classify("don't bother me");
        assert_eq!(decision.reason, RouteReason::Default);
        assert_eq!(decision.targets, vec![MEAL]);
    }

    #[test]
    fn dual_keyword_matches_select_every_agent_in_priority_order() {
        let decision = classifier().classify("Suggest a dinner with lots of protein");
        assert_eq!(decision.targets, vec![FOOD, MEAL]);
        assert_eq!(decision.reason, RouteReason::Keyword);
        assert!(decision.matched_keywords.contains(&"protein".to_string()));
        assert!(decision.matched_keywords.contains(&"suggest".to_string()));
    }

    #[test]
    fn unmatched_text_falls_back_to_the_default_agent() {
        let decision = classifier().classify("hello there");
        assert_eq!(decision.targets, vec![MEAL]);
        assert_eq!(decision.reason, RouteReason::Default);

        let food_default = Classifier::new(FOOD).classify("hello there");
        assert_eq!(food_default.targets, vec![FOOD]);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let text = "Both: calories and a meal plan";
        assert_eq!(c.classify(text), c.classify(text));
    }
}
