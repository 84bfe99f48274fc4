// Per-item inventory snapshots, one struct per resource family.
// Ephemeral: read at analysis time, never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute instance run state; anything we do not act on is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminated,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeInstance {
    pub instance_id: String,
    /// e.g. "m5.large"; the family is the part before the first '.'.
    pub instance_type: String,
    pub state: InstanceState,
    /// Reservation/spot lifecycle marker; `None` means billed on demand.
    #[serde(default)]
    pub lifecycle: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ComputeInstance {
    pub fn instance_family(&self) -> &str {
        self.instance_type
            .split('.')
            .next()
            .unwrap_or(&self.instance_type)
    }

    pub fn is_on_demand(&self) -> bool {
        self.lifecycle.is_none()
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInstance {
    pub identifier: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub instance_class: String,
    pub multi_az: bool,
    pub auto_minor_version_upgrade: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersioningStatus {
    Enabled,
    Suspended,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCluster {
    pub cluster_id: String,
    pub engine: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(default)]
    pub cluster_mode: bool,
    #[serde(default)]
    pub snapshot_retention_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerState {
    Active,
    Provisioning,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub arn: String,
    #[serde(default)]
    pub name: String,
    /// "internet-facing" or "internal".
    pub scheme: String,
    pub state: LoadBalancerState,
    #[serde(default)]
    pub deletion_protection: bool,
}

impl LoadBalancer {
    pub fn is_internet_facing(&self) -> bool {
        self.scheme != "internal"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    pub function_name: String,
    pub memory_mb: u32,
    pub timeout_secs: u32,
    #[serde(default)]
    pub runtime: String,
}
