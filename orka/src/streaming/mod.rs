//! The streaming session reactor (§4.5): a long-running loop that turns
//! debounced ingress into LLM refreshes over a per-session event bus.

pub mod event_bus;
pub mod prompt_composer;
pub mod runtime;
pub mod satellite;
pub mod state;

pub use event_bus::{Channel, EventBus, MessageKind, WireMessage};
pub use prompt_composer::PromptComposer;
pub use runtime::{RefreshOutcome, SessionPhase, SessionRuntime};
pub use satellite::SatelliteConfig;
pub use state::{PatchError, StatePatch, StreamingInvariants, StreamingMutable, StreamingState};
