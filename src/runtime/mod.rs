//! Agent-runtime boundary
//!
//! The runtime's asynchronous event stream and control surface, specified
//! only at the interface: the bridge pulls [`event::RuntimeEvent`]s, pushes
//! [`handle::RuntimeInput`]s, and receives out-of-band
//! [`handle::HookEvent`]s after built-in tools execute.

pub mod event;
pub mod handle;

pub use event::{parse_event, ContentBlock, ModelUsage, RuntimeEvent, TurnResult};
pub use handle::{AgentRuntime, HookEvent, RuntimeInput};
