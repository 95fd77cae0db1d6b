//! # gpiobox-agent
//!
//! The box-side service: an HTTP control surface for the output and a
//! supervisor loop that keeps the coordinator link alive and pushes
//! state on a fixed interval.
//!
//! - **config**: TOML configuration with per-section defaults
//! - **api**: axum router for `/`, `/on`, `/off`, `/reboot`, `/ping`
//! - **pin**: memory and sysfs output backends
//! - **probe**: ICMP or TCP reachability checks
//! - **restart**: the reboot request and process restart
//! - **supervisor**: the run loop

pub mod api;
pub mod config;
pub mod pin;
pub mod probe;
pub mod restart;
pub mod supervisor;
