//! Pipeline run states and transition reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stages of a run, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Received,
    Probed,
    Transcoded,
    Named,
    Committed,
    Done,
}

impl Stage {
    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Received => Some(Self::Probed),
            Self::Probed => Some(Self::Transcoded),
            Self::Transcoded => Some(Self::Named),
            Self::Named => Some(Self::Committed),
            Self::Committed => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Probed => write!(f, "probed"),
            Self::Transcoded => write!(f, "transcoded"),
            Self::Named => write!(f, "named"),
            Self::Committed => write!(f, "committed"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// A state a run can be observed in.
///
/// `Failed` carries the last stage the run reached before failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "lowercase")]
pub enum PipelineState {
    At(Stage),
    Failed(Stage),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(stage) => write!(f, "{stage}"),
            Self::Failed(stage) => write!(f, "failed({stage})"),
        }
    }
}

/// Receives every state a run enters.
pub struct StateObserver {
    callback: Box<dyn Fn(PipelineState) + Send + Sync>,
}

impl StateObserver {
    pub fn new(callback: impl Fn(PipelineState) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op observer that discards all transitions.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, state: PipelineState) {
        (self.callback)(state);
    }
}

impl fmt::Debug for StateObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObserver").finish_non_exhaustive()
    }
}

/// Tracks the current stage of one run and reports transitions.
#[derive(Debug)]
pub(crate) struct StateMachine<'a> {
    current: Stage,
    observer: &'a StateObserver,
}

impl<'a> StateMachine<'a> {
    pub(crate) fn new(observer: &'a StateObserver) -> Self {
        observer.send(PipelineState::At(Stage::Received));
        Self {
            current: Stage::Received,
            observer,
        }
    }

    /// Move to the next stage.
    pub(crate) fn advance(&mut self, to: Stage) {
        debug_assert_eq!(self.current.next(), Some(to), "out-of-order transition");
        tracing::info!("{} -> {to}", self.current);
        self.current = to;
        self.observer.send(PipelineState::At(to));
    }

    /// Enter the failed state, returning the stage the run stopped at.
    pub(crate) fn fail(&mut self) -> Stage {
        debug_assert_ne!(self.current, Stage::Done, "a finished run cannot fail");
        self.observer.send(PipelineState::Failed(self.current));
        self.current
    }
}
