//! Role Registry & Send Policy (component E): role validation plus
//! per-source deny lists for outbound sends.

use crate::layout::is_known_role;

/// A single `from -> to` denial. The default policy denies the three
/// transitions the event-chain router already handles so direct sends
/// cannot double-fire the chain.
#[derive(Debug, Clone)]
pub struct DenyRule {
    pub from: String,
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SendPolicy {
    deny: Vec<DenyRule>,
}

impl Default for SendPolicy {
    fn default() -> Self {
        SendPolicy {
            deny: vec![
                DenyRule {
                    from: "build".into(),
                    to: "test".into(),
                    reason: "build->test is handled by the event-chain router".into(),
                },
                DenyRule {
                    from: "build".into(),
                    to: "review".into(),
                    reason: "build->review is handled by the event-chain router".into(),
                },
                DenyRule {
                    from: "test".into(),
                    to: "review".into(),
                    reason: "test->review is handled by the event-chain router".into(),
                },
            ],
        }
    }
}

impl SendPolicy {
    pub fn with_rules(deny: Vec<DenyRule>) -> Self {
        SendPolicy { deny }
    }

    /// Returns `None` to allow, `Some(reason)` to deny.
    pub fn check(&self, from: &str, to: &str) -> Option<String> {
        self.deny
            .iter()
            .find(|r| r.from == from && r.to == to)
            .map(|r| r.reason.clone())
    }
}

/// `IsKnownRole`, re-exported here for callers that only need the registry
/// surface without pulling in the full layout module.
pub fn is_known(role: &str) -> bool {
    is_known_role(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_denies_chain_shortcuts() {
        let policy = SendPolicy::default();
        assert!(policy.check("build", "test").is_some());
        assert!(policy.check("build", "review").is_some());
        assert!(policy.check("test", "review").is_some());
    }

    #[test]
    fn default_policy_allows_everything_else() {
        let policy = SendPolicy::default();
        assert!(policy.check("edit", "build").is_none());
        assert!(policy.check("review", "edit").is_none());
    }
}
