//! Configuration options.
//!
//! This core's own tunables: how much out-of-order tolerance to pass through to the (external)
//! reassembler, how many stream messages to buffer per direction before defensively dropping the
//! oldest, and whether profiling is active. It does not configure packet capture, cores, or
//! memory -- those belong to the collaborator crates this core is embedded in.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Loads a configuration file from `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> AppLayerConfig {
    let config_str = fs::read_to_string(path).expect("ERROR: File read failed");
    toml::from_str(&config_str).expect("Invalid config file")
}

/// Loads a default configuration.
///
/// For demonstration and test purposes only:
/// ```toml
/// [conntrack]
///     max_out_of_order = 100
///
/// [smsgs]
///     max_queued = 1024
///
/// profiling_active = false
/// ```
pub fn default_config() -> AppLayerConfig {
    AppLayerConfig::default()
}

/* --------------------------------------------------------------------------------- */

/// Top-level configuration for the application-layer dispatch core.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct AppLayerConfig {
    /// Connection-tracking passthrough settings.
    #[serde(default)]
    pub conntrack: ConnTrackConfig,

    /// Stream-message queue settings.
    #[serde(default)]
    pub smsgs: SmsgConfig,

    /// Whether the `timing` feature's profiling hooks are active. Has no effect when the crate is
    /// built without the `timing` feature. Defaults to `false`.
    #[serde(default = "default_profiling_active")]
    pub profiling_active: bool,
}

fn default_profiling_active() -> bool {
    false
}

/* --------------------------------------------------------------------------------- */

/// Connection-tracking settings relevant to application-layer dispatch.
///
/// ## Example
/// ```toml
/// [conntrack]
///     max_out_of_order = 100
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ConnTrackConfig {
    /// Maximum number of out-of-order segments the reassembler tolerates per TCP connection
    /// before it is force expired. This core does not enforce the limit itself -- it is passed
    /// through to the external reassembler collaborator. Defaults to `100`.
    #[serde(default = "default_max_out_of_order")]
    pub max_out_of_order: usize,
}

impl Default for ConnTrackConfig {
    fn default() -> Self {
        ConnTrackConfig {
            max_out_of_order: default_max_out_of_order(),
        }
    }
}

fn default_max_out_of_order() -> usize {
    100
}

/* --------------------------------------------------------------------------------- */

/// Stream-message queue settings (supplemented feature, see `DESIGN.md`).
///
/// ## Example
/// ```toml
/// [smsgs]
///     max_queued = 1024
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SmsgConfig {
    /// Maximum number of reassembled stream messages buffered per direction before the oldest is
    /// dropped. `None` (the default) means unbounded, matching the base spec's silence on a
    /// limit; set this in production to bound memory when a consumer falls behind.
    #[serde(default = "default_max_queued")]
    pub max_queued: Option<usize>,
}

impl Default for SmsgConfig {
    fn default() -> Self {
        SmsgConfig {
            max_queued: default_max_queued(),
        }
    }
}

fn default_max_queued() -> Option<usize> {
    None
}
