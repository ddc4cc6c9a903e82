//! Client startup simulation for the `rusty_ready` broker.
//!
//! - [`startup`] plans and runs one boot: modules, settings, capabilities
//! - [`capabilities`] the server-reported capability set used for pane gating
//! - [`logging`] a channel-backed `log` implementation for the binary

pub mod capabilities;
pub mod logging;
pub mod startup;
