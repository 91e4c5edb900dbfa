// src/channel/state.rs
// Lifecycle state of the executor channel

use serde::{Deserialize, Serialize};

/// Status of the tool executor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Process spawned, still inside the settle delay
    Starting,
    /// Accepting requests
    Ready,
    /// Process exited or a stream broke; terminal
    Crashed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Crashed => "crashed",
        }
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: ChannelState) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Ready) | (Self::Starting | Self::Ready, Self::Crashed)
        )
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use ChannelState::*;
        assert!(Starting.can_transition_to(Ready));
        assert!(Starting.can_transition_to(Crashed));
        assert!(Ready.can_transition_to(Crashed));
        assert!(!Crashed.can_transition_to(Ready));
        assert!(!Crashed.can_transition_to(Starting));
        assert!(!Ready.can_transition_to(Starting));
        assert!(!Ready.can_transition_to(Ready));
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ChannelState::Ready).unwrap(), "\"ready\"");
        assert_eq!(ChannelState::Crashed.to_string(), "crashed");
    }
}
