//! Cascading teardown of a cluster and everything that depends on it in a
//! storage control plane.
//!
//! - [`client`]: typed access to the control plane resource API
//! - [`model`]: the control plane objects a teardown touches
//! - [`teardown`]: the stage sequence and its version-guarded writes
//! - [`context`]: named control plane endpoints from `~/.cluster-teardown/config`
//! - [`cli`]: command line arguments and report formatting

pub mod cli;
pub mod client;
pub mod context;
pub mod model;
pub mod teardown;
