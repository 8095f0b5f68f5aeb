/// Lifecycle of one harvest run. There is no way back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Running,
    /// An empty page was seen; the current batch is being delivered, no new batch follows.
    Draining,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMsg {
    /// A page was fetched and adapted; `rows` is its row count.
    PageObserved { rows: usize },
    /// Every task of the current batch has completed or been abandoned.
    BatchFinished,
    /// The stream produced no further batch.
    StreamExhausted,
    /// The caller asked the run to stop between batches.
    StopRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunState {
    phase: RunPhase,
    depleted: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Set once any page comes back empty; never cleared.
    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    /// Whether another batch may be requested.
    pub fn accepts_batches(&self) -> bool {
        self.phase == RunPhase::Running
    }
}

/// Pure transition function: applies a message and returns the next state.
pub fn update(mut state: RunState, msg: PhaseMsg) -> RunState {
    if state.phase == RunPhase::Done {
        return state;
    }
    match msg {
        PhaseMsg::PageObserved { rows: 0 } => {
            state.depleted = true;
            state.phase = RunPhase::Draining;
        }
        PhaseMsg::PageObserved { .. } => {}
        PhaseMsg::BatchFinished => {
            if state.phase == RunPhase::Draining {
                state.phase = RunPhase::Done;
            }
        }
        PhaseMsg::StreamExhausted | PhaseMsg::StopRequested => {
            state.phase = RunPhase::Done;
        }
    }
    state
}
