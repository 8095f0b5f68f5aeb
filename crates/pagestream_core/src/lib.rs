//! Pagestream core: pagination state, URL streams, batching and the run phase machine.
mod batch;
mod phase;
mod state;
mod stream;

pub use batch::{Batch, BatchError, Batcher};
pub use phase::{update, PhaseMsg, RunPhase, RunState};
pub use state::{PaginationState, StateError};
pub use stream::{CounterStream, PageStream, ResponseStream, StaticStream};
