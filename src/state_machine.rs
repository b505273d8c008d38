//! Conversation controller state machine
//!
//! `transition` decides; the runtime executes the resulting effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{ChatContext, ChatState, ChatView, Phase};
pub use transition::{transition, TransitionError, TransitionResult};
