//! Kernel execution states broadcast on IOPub.
//!
//! Every inbound non-heartbeat message is bracketed by `busy` and `idle`;
//! `starting` goes out exactly once per launch.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Starting,
    Busy,
    Idle,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Starting => "starting",
            ExecutionState::Busy => "busy",
            ExecutionState::Idle => "idle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(ExecutionState::Starting.as_str(), "starting");
        assert_eq!(ExecutionState::Busy.as_str(), "busy");
        assert_eq!(ExecutionState::Idle.as_str(), "idle");
    }
}
