//! Messaging session surface: lifecycle events, the session handle trait, and
//! the gateway client that implements it.

pub mod event;
pub mod gateway;
pub mod handle;
pub mod protocol;

pub use event::{InboundMessage, MediaPayload, SessionEvent, SessionPhase};
pub use gateway::{SessionGateway, DEFAULT_GATEWAY_URL};
pub use handle::{SessionError, SessionHandle};
