//! Bay Launcher Library
//!
//! Startup sequencing for a golf-simulator bay: wait for the network,
//! power on the TV, launch the simulator, tidy up its windows.

pub mod config;
pub mod logging;
pub mod net;
pub mod poll;
pub mod process;
pub mod sequence;
pub mod smartthings;
pub mod window;
