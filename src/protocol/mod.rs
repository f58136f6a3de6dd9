//! Protocol module for session communication
//!
//! Defines the message types exchanged with clients over the session
//! WebSocket. The protocol uses JSON with a `type` discriminator.

mod messages;

pub use messages::*;
