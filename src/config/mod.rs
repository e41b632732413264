//! Container configuration types
//!
//! This module defines the container configuration carried by images and
//! containers, the merge engine that reconciles user configuration with the
//! configuration inherited from a base image, and the Dockerfile-style change
//! instructions accepted at commit time.
//!
//! Set-like fields use `BTreeMap` so that serialized configurations (and the
//! image ids derived from them) do not depend on map iteration order.

pub mod changes;
pub mod merge;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use changes::apply_changes;
pub use merge::{merge, EnvKeyCase};

/// Marker value for set-like JSON fields serialized as `{"key":{}}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Health check configuration, durations in nanoseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(rename = "Test", default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<String>,
    #[serde(rename = "Interval", default)]
    pub interval: i64,
    #[serde(rename = "Timeout", default)]
    pub timeout: i64,
    #[serde(rename = "Retries", default)]
    pub retries: i64,
}

/// Configuration of a container, as supplied by the user or carried by an
/// image configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "User", default)]
    pub user: String,
    #[serde(
        rename = "ExposedPorts",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub exposed_ports: BTreeMap<String, Empty>,
    #[serde(rename = "Env", default)]
    pub env: Vec<String>,
    #[serde(rename = "Cmd", default)]
    pub cmd: Vec<String>,
    #[serde(rename = "Entrypoint", default)]
    pub entrypoint: Vec<String>,
    /// True when entrypoint/cmd are already shell-escaped; inherited together
    /// with them
    #[serde(rename = "ArgsEscaped", default)]
    pub args_escaped: bool,
    #[serde(rename = "Labels", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(
        rename = "Volumes",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub volumes: BTreeMap<String, Empty>,
    #[serde(rename = "WorkingDir", default)]
    pub working_dir: String,
    #[serde(rename = "StopSignal", default)]
    pub stop_signal: String,
    #[serde(
        rename = "Healthcheck",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub healthcheck: Option<HealthConfig>,
}

impl ContainerConfig {
    /// True when neither entrypoint nor command was specified
    pub fn has_no_process(&self) -> bool {
        self.entrypoint.is_empty() && self.cmd.is_empty()
    }
}
