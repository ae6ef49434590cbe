//! # Communications interface crate.
//!
//! Provides the network interfaces shared between the drive executable and the tools which talk
//! to it: telecommands from the driver station and frames from the vision coprocessor.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Frames sent by equipment (like the vision coprocessor)
pub mod eqpt;

/// Network module
pub mod net;
