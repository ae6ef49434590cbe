//! # Equipment Interface
//!
//! This module defines the interface structures which are sent by equipment servers to the drive
//! executable.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod vision;
