//! Approval policy rules and configuration.
//!
//! The policy table says, per object type, how many review steps exist and
//! how many approvals each step requires. It is data, not code: serde
//! round-trippable so deployments can ship their own table.

use serde::{Deserialize, Serialize};

use crate::domain::ObjectType;

/// Step requirements for one object type.
///
/// `approvals_per_step[0]` is step 1, and so on. Step numbers on incoming
/// decisions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub object_type: ObjectType,
    pub approvals_per_step: Vec<u32>,
}

impl PolicyRule {
    pub fn new(object_type: ObjectType, approvals_per_step: Vec<u32>) -> Self {
        Self {
            object_type,
            approvals_per_step,
        }
    }
}

/// The full approval policy table, keyed by object type.
///
/// Object types without a rule get the implicit default of one step with
/// one required approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub rules: Vec<PolicyRule>,
}

impl ApprovalPolicy {
    /// Standard policy: one step, one approval, for every object type.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                PolicyRule::new(ObjectType::CaseRevision, vec![1]),
                PolicyRule::new(ObjectType::ScenarioRevision, vec![1]),
                PolicyRule::new(ObjectType::Release, vec![1]),
                PolicyRule::new(ObjectType::Waiver, vec![1]),
            ],
        }
    }

    /// Replace (or add) the rule for one object type (builder pattern).
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.retain(|r| r.object_type != rule.object_type);
        self.rules.push(rule);
        self
    }

    fn rule_for(&self, object_type: ObjectType) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.object_type == object_type)
    }

    /// Number of review steps for an object type (at least 1).
    pub fn step_count(&self, object_type: ObjectType) -> u32 {
        self.rule_for(object_type)
            .map(|r| r.approvals_per_step.len().max(1) as u32)
            .unwrap_or(1)
    }

    /// Required approvals for a given 1-based step, `None` when the step
    /// does not exist for this object type.
    pub fn required_approvals(&self, object_type: ObjectType, step: u32) -> Option<u32> {
        if step == 0 {
            return None;
        }
        match self.rule_for(object_type) {
            Some(rule) => rule.approvals_per_step.get((step - 1) as usize).copied(),
            // Implicit default rule.
            None if step == 1 => Some(1),
            None => None,
        }
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_policy_single_step() {
        let policy = ApprovalPolicy::standard();
        assert_eq!(policy.step_count(ObjectType::CaseRevision), 1);
        assert_eq!(policy.required_approvals(ObjectType::Release, 1), Some(1));
    }

    #[test]
    fn test_step_out_of_range() {
        let policy = ApprovalPolicy::standard();
        assert_eq!(policy.required_approvals(ObjectType::Release, 0), None);
        assert_eq!(policy.required_approvals(ObjectType::Release, 2), None);
    }

    #[test]
    fn test_with_rule_replaces() {
        let policy = ApprovalPolicy::standard()
            .with_rule(PolicyRule::new(ObjectType::Release, vec![1, 2]));
        assert_eq!(policy.step_count(ObjectType::Release), 2);
        assert_eq!(policy.required_approvals(ObjectType::Release, 2), Some(2));
        assert_eq!(policy.rules.len(), 4);
    }

    #[test]
    fn test_missing_rule_defaults_to_one_of_one() {
        let policy = ApprovalPolicy { rules: vec![] };
        assert_eq!(policy.step_count(ObjectType::ScenarioRevision), 1);
        assert_eq!(
            policy.required_approvals(ObjectType::ScenarioRevision, 1),
            Some(1)
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let policy = ApprovalPolicy::standard()
            .with_rule(PolicyRule::new(ObjectType::Release, vec![2, 1]));
        let json = serde_json::to_string(&policy).unwrap();
        let back: ApprovalPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }
}
