// Finding: one rule's verdict on one resource, plus the shared builder every rule uses.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Urgency of a finding. Ordering is by urgency: `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    /// Parse the stored/uppercase form ("HIGH", "medium", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Some(Severity::High),
            "MEDIUM" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource family a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceFamily {
    Compute,
    ManagedDatabase,
    ObjectStore,
    Cache,
    LoadBalancer,
    Function,
}

impl ResourceFamily {
    pub const ALL: [ResourceFamily; 6] = [
        ResourceFamily::Compute,
        ResourceFamily::ManagedDatabase,
        ResourceFamily::ObjectStore,
        ResourceFamily::Cache,
        ResourceFamily::LoadBalancer,
        ResourceFamily::Function,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceFamily::Compute => "Compute",
            ResourceFamily::ManagedDatabase => "ManagedDatabase",
            ResourceFamily::ObjectStore => "ObjectStore",
            ResourceFamily::Cache => "Cache",
            ResourceFamily::LoadBalancer => "LoadBalancer",
            ResourceFamily::Function => "Function",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finding is about: an inventoried resource family, or a billed service
/// (cost-aggregation findings carry the service name as reported by billing).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Family(ResourceFamily),
    BilledService(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Family(f) => f.as_str(),
            ResourceType::BilledService(s) => s,
        }
    }

    /// Inverse of `as_str`: family labels map back to families, anything else is a service.
    pub fn from_label(s: &str) -> Self {
        match ResourceFamily::parse(s) {
            Some(f) => ResourceType::Family(f),
            None => ResourceType::BilledService(s.to_string()),
        }
    }
}

impl From<ResourceFamily> for ResourceType {
    fn from(f: ResourceFamily) -> Self {
        ResourceType::Family(f)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ResourceType::from_label(&s))
    }
}

/// Immutable once built. Construct through [`FindingBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub current_state: String,
    pub suggested_action: String,
    #[serde(default)]
    pub current_cost: f64,
    #[serde(default)]
    pub potential_savings: f64,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_details: Option<String>,
}

impl Finding {
    pub fn builder(
        resource_type: impl Into<ResourceType>,
        resource_id: impl Into<String>,
        severity: Severity,
    ) -> FindingBuilder {
        FindingBuilder {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            severity,
            current_state: String::new(),
            suggested_action: String::new(),
            current_cost: 0.0,
            potential_savings: 0.0,
            additional_details: None,
        }
    }
}

/// Shared value-construction helper: costs default to 0 when a rule does not estimate them.
#[derive(Debug, Clone)]
pub struct FindingBuilder {
    resource_type: ResourceType,
    resource_id: String,
    severity: Severity,
    current_state: String,
    suggested_action: String,
    current_cost: f64,
    potential_savings: f64,
    additional_details: Option<String>,
}

impl FindingBuilder {
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.current_state = state.into();
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = action.into();
        self
    }

    pub fn costs(mut self, current_cost: f64, potential_savings: f64) -> Self {
        self.current_cost = current_cost;
        self.potential_savings = potential_savings;
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.additional_details = Some(details.into());
        self
    }

    pub fn build(self) -> Finding {
        Finding {
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            current_state: self.current_state,
            suggested_action: self.suggested_action,
            current_cost: self.current_cost,
            potential_savings: self.potential_savings,
            severity: self.severity,
            additional_details: self.additional_details,
        }
    }
}

/// Presentation order: most urgent first, then larger savings first. Stable.
pub fn rank_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity.cmp(&a.severity).then_with(|| {
            b.potential_savings
                .partial_cmp(&a.potential_savings)
                .unwrap_or(Ordering::Equal)
        })
    });
}
