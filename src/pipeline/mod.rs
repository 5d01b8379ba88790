//! Pipeline supervision: state machine, sample loop, and the stream
//! controller that owns the whole aggregate.
//!
//! Data flows one direction:
//!
//! ```text
//! SampleSource ─▶ FilterChain ─▶ ChannelBank ─▶ { quality, spectral } ─▶ RenderFrame
//! ```
//!
//! Two cooperatively scheduled loops drive it: the sample loop (paced by the
//! source) and the render loop (paced by the target frame rate). Neither
//! blocks the other; they coordinate only through the controller-owned
//! shared state.

mod controller;
mod sample_loop;
mod state;

pub use controller::StreamController;
pub use sample_loop::{ingest, SampleLoop};
pub use state::{PipelineShared, StreamState};
