//! CLI module for cluster-teardown
//!
//! One command: locate a cluster by account, domain and name, then delete it
//! and every control plane object that depends on it.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::context::Overrides;
use crate::teardown::{
    storage::{
        MAX_POLL_INTERVAL_SECS, MAX_RELEASE_TIMEOUT_SECS, POLL_INTERVAL_SECS, RELEASE_TIMEOUT_SECS,
    },
    ClusterSelector, ReleaseConfig, TeardownOptions,
};

mod display;

pub use display::*;

#[derive(Parser, Debug)]
#[command(name = "cluster-teardown")]
#[command(
    about = "Delete a cluster and related control plane resources",
    long_about = "Delete a cluster and related control plane resources. \
        The cluster must be in DEPLOYABLE, TIMED_OUT or TEAR_DOWN state. \
        Volume series bound to the cluster are transitioned to the UNBOUND state \
        and the underlying block storage is released; snapshots are retained."
)]
#[command(version)]
pub struct Args {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file (default: ~/.cluster-teardown/config)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Context from the config file to connect with
    #[arg(long, env = "TEARDOWN_CONTEXT")]
    pub context: Option<String>,

    /// Control plane URL, overriding the context
    #[arg(long, env = "TEARDOWN_URL")]
    pub url: Option<String>,

    /// The certificate to use for secure connections
    #[arg(short = 'E', long, env = "TEARDOWN_CERT")]
    pub cert: Option<String>,

    /// The private key to use for secure connections
    #[arg(long, env = "TEARDOWN_KEY")]
    pub key: Option<String>,

    /// Name of the account that owns the domain and cluster
    #[arg(short = 'A', long)]
    pub account: Option<String>,

    /// Name of a cloud service provider domain
    #[arg(short = 'D', long)]
    pub domain: Option<String>,

    /// Name of a cluster in the specified domain
    #[arg(short = 'C', long)]
    pub cluster_name: Option<String>,

    /// Permanently delete all volume-series bound to the cluster, including
    /// their snapshots, consistency groups and application groups
    #[arg(long)]
    pub delete_volumes: bool,

    /// Mark active storage and volume series requests of the cluster as failed
    /// instead of aborting; best-effort, the control plane may still be
    /// processing them
    #[arg(long)]
    pub fail_requests: bool,

    /// Confirm the deletion of the cluster
    #[arg(short = 'y', long)]
    pub confirm: bool,

    /// Seconds allowed for storage release requests to complete
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = RELEASE_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_RELEASE_TIMEOUT_SECS)
    )]
    pub release_timeout: u64,

    /// Seconds between storage request polls
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_POLL_INTERVAL_SECS)
    )]
    pub poll_interval: u64,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to a .env file for loading connection settings
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            context: self.context.clone(),
            cert: self.cert.clone(),
            key: self.key.clone(),
        }
    }

    pub fn selector(&self) -> ClusterSelector {
        ClusterSelector {
            account: self.account.clone(),
            domain: self.domain.clone(),
            cluster_name: self.cluster_name.clone(),
        }
    }

    /// Service plans are only deauthorized when volumes are deleted
    pub fn options(&self) -> TeardownOptions {
        TeardownOptions {
            delete_volumes: self.delete_volumes,
            fail_requests: self.fail_requests,
            deauthorize: self.delete_volumes,
            confirmed: self.confirm,
        }
    }

    pub fn release_config(&self) -> ReleaseConfig {
        ReleaseConfig::default()
            .with_release_timeout(Duration::from_secs(self.release_timeout))
            .with_poll_interval(Duration::from_secs(self.poll_interval))
    }
}
