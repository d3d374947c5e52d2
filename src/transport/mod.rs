//! # Transport Layer
//!
//! TCP session setup around the packet codec.
//!
//! ## Components
//! - **Channel**: connection identity and outbound queue given to handlers
//! - **Listener**: connect/disconnect lifecycle hooks
//! - **Session**: framed read/dispatch/write loop for one connection
//! - **Server** / **Client**: validated builders and connection handles

pub mod channel;
pub mod client;
pub mod listener;
pub(crate) mod session;
pub mod server;
