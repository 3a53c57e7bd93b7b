use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stages a component moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Instance constructed
    Created,
    /// Cross-component references wired
    Resolved,
    /// Component is live
    Started,
    /// Torn down; only reached through the teardown pass
    Stopped,
}

impl State {
    pub const ALL: [State; 4] = [State::Created, State::Resolved, State::Started, State::Stopped];

    /// The stage a component enters when it is materialized
    pub const fn first() -> Self {
        State::Created
    }

    /// The stage reached during teardown
    pub const fn terminal() -> Self {
        State::Stopped
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The immediate successor, if any
    pub fn next(self) -> Option<Self> {
        State::ALL.get(self.index() + 1).copied()
    }

    /// The immediate predecessor, if any
    pub fn previous(self) -> Option<Self> {
        self.index()
            .checked_sub(1)
            .and_then(|index| State::ALL.get(index).copied())
    }

    /// Whether the stage is visited by the startup pass
    pub fn is_startup(self) -> bool {
        self != State::terminal()
    }

    /// Stages visited by startup, in ascending order
    pub fn startup() -> impl Iterator<Item = State> {
        State::ALL.into_iter().filter(|state| state.is_startup())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Created => "created",
            State::Resolved => "resolved",
            State::Started => "started",
            State::Stopped => "stopped",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
