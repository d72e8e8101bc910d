//! Event-Chain Router (component F): maps `(role, outcome)` to a follow-up
//! message, with `${var}` expansion and optional analyst/watcher
//! notification flags.

use std::collections::HashMap;

use crate::io::error::BusError;
use crate::io::inbox;
use crate::layout::Layout;
use crate::schema::message::{Message, MessageType};
use crate::subscriptions;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct ChainAction {
    pub send_to: String,
    pub action: String,
    pub msg_type: MessageType,
    pub message_template: String,
}

#[derive(Debug, Clone)]
pub struct ChainRule {
    pub role: String,
    pub outcome: Outcome,
    pub action: ChainAction,
    pub notify_analyst: bool,
    pub notify_watcher: bool,
}

/// Substitutes `${var}` placeholders with values from `vars`; unknown
/// placeholders are left verbatim.
pub fn expand_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The built-in edit -> build -> test -> review chain.
pub fn default_rules() -> Vec<ChainRule> {
    vec![
        ChainRule {
            role: "build".into(),
            outcome: Outcome::Success,
            action: ChainAction {
                send_to: "test".into(),
                action: "test".into(),
                msg_type: MessageType::Request,
                message_template: "build succeeded (${command}), please test".into(),
            },
            notify_analyst: false,
            notify_watcher: false,
        },
        ChainRule {
            role: "build".into(),
            outcome: Outcome::Failure,
            action: ChainAction {
                send_to: "edit".into(),
                action: "fix".into(),
                msg_type: MessageType::Event,
                message_template: "build failed with exit ${exit_code}: ${command}".into(),
            },
            notify_analyst: true,
            notify_watcher: false,
        },
        ChainRule {
            role: "test".into(),
            outcome: Outcome::Success,
            action: ChainAction {
                send_to: "review".into(),
                action: "review".into(),
                msg_type: MessageType::Request,
                message_template: "tests passed (${command}), please review".into(),
            },
            notify_analyst: false,
            notify_watcher: false,
        },
        ChainRule {
            role: "test".into(),
            outcome: Outcome::Failure,
            action: ChainAction {
                send_to: "edit".into(),
                action: "fix".into(),
                msg_type: MessageType::Event,
                message_template: "tests failed with exit ${exit_code}: ${command}".into(),
            },
            notify_analyst: true,
            notify_watcher: false,
        },
        ChainRule {
            role: "review".into(),
            outcome: Outcome::Success,
            action: ChainAction {
                send_to: "edit".into(),
                action: "review-complete".into(),
                msg_type: MessageType::Event,
                message_template: "review complete (${command})".into(),
            },
            notify_analyst: false,
            notify_watcher: false,
        },
    ]
}

pub struct Router {
    rules: Vec<ChainRule>,
}

impl Router {
    pub fn new(rules: Vec<ChainRule>) -> Self {
        Router { rules }
    }

    fn find(&self, role: &str, outcome: Outcome) -> Option<&ChainRule> {
        self.rules
            .iter()
            .find(|r| r.role == role && r.outcome == outcome)
    }

    /// Invoked when `role` reports completion (typically from the `log`
    /// command). Never triggered by ordinary `Send`/`SendNoCC` calls — see
    /// the Open Question decision in DESIGN.md: subscription copies cannot
    /// themselves fire a chain rule.
    pub fn dispatch(
        &self,
        layout: &Layout,
        role: &str,
        outcome: Outcome,
        exit_code: i32,
        command: &str,
    ) -> Result<(), BusError> {
        let Some(rule) = self.find(role, outcome) else {
            return Ok(());
        };

        let mut vars = HashMap::new();
        vars.insert("exit_code", exit_code.to_string());
        vars.insert("command", command.to_string());
        let payload = expand_template(&rule.action.message_template, &vars);

        let msg = Message::new(
            role,
            &rule.action.send_to,
            rule.action.msg_type,
            &rule.action.action,
            payload,
        );
        inbox::send_no_cc(layout, &msg)?;
        subscriptions::fan_out(layout, &msg)?;

        if rule.notify_analyst {
            let note = Message::new(
                role,
                "analyst",
                MessageType::Event,
                "chain-notify",
                format!("{role} {outcome:?} for {command}"),
            );
            inbox::send_no_cc(layout, &note)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn expand_template_substitutes_known_vars() {
        let mut vars = HashMap::new();
        vars.insert("exit_code", "1".to_string());
        vars.insert("command", "go test".to_string());
        let out = expand_template("failed ${exit_code}: ${command}", &vars);
        assert_eq!(out, "failed 1: go test");
    }

    #[test]
    fn expand_template_leaves_unknown_vars() {
        let vars = HashMap::new();
        let out = expand_template("hello ${missing}", &vars);
        assert_eq!(out, "hello ${missing}");
    }

    #[test]
    fn build_success_routes_to_test() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let router = Router::new(default_rules());
        router
            .dispatch(&layout, "build", Outcome::Success, 0, "go build ./...")
            .unwrap();
        let received = inbox::receive(&layout, "test").unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].action, "test");
    }

    #[test]
    fn build_failure_notifies_analyst() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let router = Router::new(default_rules());
        router
            .dispatch(&layout, "build", Outcome::Failure, 1, "go build ./...")
            .unwrap();
        assert_eq!(inbox::receive(&layout, "edit").unwrap().len(), 1);
        assert_eq!(inbox::receive(&layout, "analyst").unwrap().len(), 1);
    }

    #[test]
    fn unmatched_role_outcome_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let router = Router::new(default_rules());
        router
            .dispatch(&layout, "docs", Outcome::Success, 0, "x")
            .unwrap();
        assert!(inbox::peek(&layout, "edit").unwrap().is_empty());
    }
}
