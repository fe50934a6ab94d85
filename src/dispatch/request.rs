use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SupervisorError};

/// Control verb applied to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAction {
    Start,
    Stop,
    Restart,
    Lead,
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAction::Start => write!(f, "start"),
            NodeAction::Stop => write!(f, "stop"),
            NodeAction::Restart => write!(f, "restart"),
            NodeAction::Lead => write!(f, "lead"),
        }
    }
}

impl FromStr for NodeAction {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(NodeAction::Start),
            "stop" => Ok(NodeAction::Stop),
            "restart" => Ok(NodeAction::Restart),
            "lead" => Ok(NodeAction::Lead),
            other => Err(SupervisorError::InvalidRequest(format!(
                "unknown action: {other}"
            ))),
        }
    }
}

/// How much node state a stop or restart discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanMode {
    /// Remove the node's data directory.
    Data,
    /// Remove all node state under the private directory.
    All,
}

impl fmt::Display for CleanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanMode::Data => write!(f, "data"),
            CleanMode::All => write!(f, "all"),
        }
    }
}

impl FromStr for CleanMode {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "data" => Ok(CleanMode::Data),
            "all" => Ok(CleanMode::All),
            other => Err(SupervisorError::InvalidRequest(format!(
                "unknown clean mode: {other}"
            ))),
        }
    }
}

/// Optional arguments carried by a control request. Only `clean` is
/// recognized; anything else is rejected before a request is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean: Option<CleanMode>,
}

/// One control request for one node. Immutable once built; duplicate
/// detection compares requests field for field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub node: String,
    pub action: NodeAction,
    #[serde(default)]
    pub args: RequestArgs,
}

impl ControlRequest {
    pub fn new(node: impl Into<String>, action: NodeAction) -> Self {
        Self {
            node: node.into(),
            action,
            args: RequestArgs::default(),
        }
    }

    pub fn with_clean(mut self, clean: CleanMode) -> Self {
        self.args.clean = Some(clean);
        self
    }

    /// Shape check, run synchronously on the dispatch path. An invalid
    /// request must never mutate any scheduling state.
    pub fn validate(&self) -> Result<()> {
        if self.node.is_empty() {
            return Err(SupervisorError::InvalidRequest(
                "node name is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Scheduling key for this request (see [`JobKey`]).
    pub fn key(&self) -> JobKey {
        match self.action {
            NodeAction::Lead => JobKey::Lead,
            _ => JobKey::Node(self.node.clone()),
        }
    }
}

/// Exclusive-ownership slot a request is scheduled under.
///
/// `lead` requests collapse onto one cluster-wide slot regardless of which
/// node they name, since only one leadership change may run at a time.
/// Every other action is keyed by the node it targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    Lead,
    Node(String),
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Lead => write!(f, "lead"),
            JobKey::Node(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_str() {
        for action in [
            NodeAction::Start,
            NodeAction::Stop,
            NodeAction::Restart,
            NodeAction::Lead,
        ] {
            assert_eq!(action.to_string().parse::<NodeAction>().unwrap(), action);
        }
    }

    #[test]
    fn unknown_action_is_invalid() {
        let err = "reboot".parse::<NodeAction>().unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidRequest(_)));
    }

    #[test]
    fn unknown_clean_mode_is_invalid() {
        assert!("data".parse::<CleanMode>().is_ok());
        assert!("all".parse::<CleanMode>().is_ok());
        assert!("some".parse::<CleanMode>().is_err());
    }

    #[test]
    fn empty_node_name_fails_validation() {
        let req = ControlRequest::new("", NodeAction::Start);
        assert!(matches!(
            req.validate(),
            Err(SupervisorError::InvalidRequest(_))
        ));
    }

    #[test]
    fn lead_requests_share_one_key() {
        let a = ControlRequest::new("a", NodeAction::Lead);
        let b = ControlRequest::new("b", NodeAction::Lead);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), JobKey::Lead);
    }

    #[test]
    fn other_actions_key_by_node() {
        let a = ControlRequest::new("a", NodeAction::Start);
        let b = ControlRequest::new("b", NodeAction::Start);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), JobKey::Node("a".to_string()));
    }

    #[test]
    fn equality_covers_args() {
        let plain = ControlRequest::new("n1", NodeAction::Stop);
        let cleaning = ControlRequest::new("n1", NodeAction::Stop).with_clean(CleanMode::Data);
        assert_eq!(plain, plain.clone());
        assert_ne!(plain, cleaning);
        assert_ne!(
            cleaning,
            ControlRequest::new("n1", NodeAction::Stop).with_clean(CleanMode::All)
        );
    }
}
