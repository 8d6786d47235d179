use std::fmt;

/// Outcome of a single node tick.
///
/// `Invalid` means "never run, or interrupted before producing a result" — it is the
/// status every node starts in and the status composites/decorators force onto a
/// subtree they interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Status {
    Invalid,
    Running,
    Success,
    Failure,
}

impl Status {
    /// `true` for `Success`/`Failure`, the two statuses a tick cannot revisit without
    /// going through `initialise` again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Invalid => "INVALID",
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
        }
    }

    /// Parses the wire form used by checkpoint files (`tree_state` values in §6.2).
    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "INVALID" => Some(Status::Invalid),
            "RUNNING" => Some(Status::Running),
            "SUCCESS" => Some(Status::Success),
            "FAILURE" => Some(Status::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(Status::Success.is_terminal());
        assert!(Status::Failure.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert!(!Status::Invalid.is_terminal());
    }

    #[test]
    fn round_trips_through_wire_form() {
        for status in [Status::Invalid, Status::Running, Status::Success, Status::Failure] {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
    }
}
