//! Confidence scoring for ranking tools against an intent.
//!
//! The base score comes from coarse substring matching of a capability's use
//! cases and keywords against the lower-cased intent, minus a penalty per
//! missing prerequisite. Absolute values are intentionally low; treat scores as
//! a relative ranking signal, not a calibrated probability.
//!
//! Contextual adjustments live in one ordered rule table applied by the
//! selector, so ranking behavior is testable in a single place rather than
//! scattered across per-tool overrides.

use crate::context::RequestContext;
use crate::tools::Capability;

/// Penalty applied per prerequisite key missing from the context.
const PREREQUISITE_PENALTY: f64 = 0.2;

/// Base score assigned when a capability declares no use cases or keywords.
const NO_SIGNAL_BASE: f64 = 0.1;

/// Compute the base applicability score for a capability in `[0, 1]`.
pub fn base_score(capability: &Capability, intent: &str, context: &RequestContext) -> f64 {
    let intent_lower = intent.to_lowercase();

    let use_case_matches = capability
        .use_cases
        .iter()
        .filter(|uc| intent_lower.contains(&uc.to_lowercase()))
        .count();

    let keyword_matches = capability
        .confidence_keywords
        .iter()
        .filter(|kw| intent_lower.contains(&kw.to_lowercase()))
        .count();

    let total = capability.use_cases.len() + capability.confidence_keywords.len();
    let base = if total == 0 {
        NO_SIGNAL_BASE
    } else {
        (use_case_matches + keyword_matches) as f64 / total as f64
    };

    let missing_prereqs = capability
        .prerequisites
        .iter()
        .filter(|key| !context.contains_key(key))
        .count();
    let penalty = missing_prereqs as f64 * PREREQUISITE_PENALTY;

    (base - penalty).clamp(0.0, 1.0)
}

/// Which tools a rule applies to.
#[derive(Debug, Clone)]
pub enum RuleScope {
    /// Applies to every tool.
    Any,
    /// Applies only to the named tools.
    Tools(&'static [&'static str]),
}

impl RuleScope {
    fn covers(&self, tool_name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Tools(names) => names.contains(&tool_name),
        }
    }
}

/// Condition under which a rule fires.
#[derive(Debug, Clone)]
pub enum RuleCondition {
    /// All listed context keys are present.
    ContextKeys(&'static [&'static str]),
    /// Any listed keyword appears in the lower-cased request text.
    IntentKeywords(&'static [&'static str]),
    /// The tool name appears in the session's recent tool usage.
    RecentlyUsed,
}

/// A named confidence adjustment.
#[derive(Debug, Clone)]
pub struct ScoreRule {
    pub name: &'static str,
    pub scope: RuleScope,
    pub condition: RuleCondition,
    pub delta: f64,
}

impl ScoreRule {
    fn fires(&self, tool_name: &str, intent_lower: &str, context: &RequestContext) -> bool {
        if !self.scope.covers(tool_name) {
            return false;
        }
        match &self.condition {
            RuleCondition::ContextKeys(keys) => keys.iter().all(|k| context.contains_key(k)),
            RuleCondition::IntentKeywords(keywords) => {
                keywords.iter().any(|kw| intent_lower.contains(kw))
            }
            RuleCondition::RecentlyUsed => context
                .recent_tool_usage()
                .iter()
                .any(|name| *name == tool_name),
        }
    }
}

/// The canonical contextual-adjustment table, applied in order.
pub fn default_rule_table() -> Vec<ScoreRule> {
    vec![
        // Data tools get a boost when the request is anchored to a user and date.
        ScoreRule {
            name: "data_tool_context_boost",
            scope: RuleScope::Tools(&["warehouse_query", "data_transform"]),
            condition: RuleCondition::ContextKeys(&["user_id", "date"]),
            delta: 0.2,
        },
        // Documentation-flavored requests favor the document store.
        ScoreRule {
            name: "documentation_boost",
            scope: RuleScope::Tools(&["document_search"]),
            condition: RuleCondition::IntentKeywords(&[
                "guide",
                "documentation",
                "template",
                "policy",
                "format",
            ]),
            delta: 0.15,
        },
        // Nudge away from tools the session just used.
        ScoreRule {
            name: "recent_use_penalty",
            scope: RuleScope::Any,
            condition: RuleCondition::RecentlyUsed,
            delta: -0.1,
        },
    ]
}

/// Apply a rule table to a base score, re-clamping to `[0, 1]`.
pub fn apply_rules(
    rules: &[ScoreRule],
    tool_name: &str,
    base: f64,
    intent: &str,
    context: &RequestContext,
) -> f64 {
    let intent_lower = intent.to_lowercase();
    let mut score = base;
    for rule in rules {
        if rule.fires(tool_name, &intent_lower, context) {
            tracing::trace!(rule = rule.name, tool = tool_name, delta = rule.delta, "score rule fired");
            score += rule.delta;
        }
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::capability::Capability;

    fn cap(use_cases: &[&str], keywords: &[&str], prereqs: &[&str]) -> Capability {
        Capability::new("test_tool", "test")
            .with_use_cases(use_cases)
            .with_confidence_keywords(keywords)
            .with_prerequisites(prereqs)
    }

    #[test]
    fn no_signal_capability_scores_baseline() {
        let c = cap(&[], &[], &[]);
        let ctx = RequestContext::new();
        assert!((base_score(&c, "anything at all", &ctx) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn matches_are_proportional_to_total_phrases() {
        let c = cap(&["query data"], &["data", "sql", "warehouse"], &[]);
        let ctx = RequestContext::new();
        // "query data from the warehouse" matches the use case + "data" + "warehouse": 3/4.
        let score = base_score(&c, "query data from the warehouse", &ctx);
        assert!((score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn missing_prerequisites_penalize() {
        let c = cap(&[], &["report"], &["date", "user_id"]);
        let mut ctx = RequestContext::new();
        // 1/1 match but two missing prerequisites: 1.0 - 0.4 = 0.6.
        assert!((base_score(&c, "report please", &ctx) - 0.6).abs() < 1e-9);

        ctx.insert("date", "2026-01-05");
        assert!((base_score(&c, "report please", &ctx) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let c = cap(&[], &["x"], &["a", "b", "c", "d", "e", "f"]);
        let ctx = RequestContext::new();
        assert_eq!(base_score(&c, "nothing relevant", &ctx), 0.0);
    }

    #[test]
    fn data_tool_boost_requires_both_keys() {
        let rules = default_rule_table();
        let mut ctx = RequestContext::new();
        ctx.insert("user_id", "u1");

        let unboosted = apply_rules(&rules, "warehouse_query", 0.3, "activity", &ctx);
        assert!((unboosted - 0.3).abs() < 1e-9);

        ctx.insert("date", "2026-01-05");
        let boosted = apply_rules(&rules, "warehouse_query", 0.3, "activity", &ctx);
        assert!((boosted - 0.5).abs() < 1e-9);
    }

    #[test]
    fn documentation_boost_is_scoped() {
        let rules = default_rule_table();
        let ctx = RequestContext::new();

        let doc = apply_rules(&rules, "document_search", 0.2, "find the style guide", &ctx);
        assert!((doc - 0.35).abs() < 1e-9);

        // Same intent, different tool: no boost.
        let other = apply_rules(&rules, "warehouse_query", 0.2, "find the style guide", &ctx);
        assert!((other - 0.2).abs() < 1e-9);
    }

    #[test]
    fn recent_use_penalty_applies_to_any_tool() {
        let rules = default_rule_table();
        let mut ctx = RequestContext::new();
        ctx.insert("recent_tool_usage", serde_json::json!(["summarize"]));

        let penalized = apply_rules(&rules, "summarize", 0.5, "summary", &ctx);
        assert!((penalized - 0.4).abs() < 1e-9);
    }

    #[test]
    fn adjusted_score_never_leaves_unit_interval() {
        let rules = default_rule_table();
        let mut ctx = RequestContext::new();
        ctx.insert("user_id", "u1");
        ctx.insert("date", "2026-01-05");

        assert_eq!(
            apply_rules(&rules, "warehouse_query", 0.95, "data", &ctx),
            1.0
        );

        ctx.insert("recent_tool_usage", serde_json::json!(["knowledge_search"]));
        assert_eq!(
            apply_rules(&rules, "knowledge_search", 0.05, "anything", &ctx),
            0.0
        );
    }
}
