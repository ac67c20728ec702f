//! # Task classification: kind and priority.
//!
//! [`TaskType`] selects the executor that handles a task; [`Priority`] decides
//! which pending task the dispatcher picks next.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Kind of work a task represents.
///
/// Well-known kinds have dedicated variants; anything else is carried as
/// [`TaskType::Custom`]. Serialized as a plain string (`"bim_analysis"`,
/// `"demo"`, ...), and parsing a well-known name always yields its variant.
///
/// Equality and hashing go by the string form, so `Custom("bim_analysis")`
/// and `BimAnalysis` name the same executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    /// OCR + analysis of an uploaded document.
    DocumentAnalysis,
    /// Clash detection and quantity checks on a BIM model.
    BimAnalysis,
    /// Regulatory compliance check of a project artifact.
    ComplianceCheck,
    /// Creation and assignment of follow-up tasks.
    TaskCreation,
    /// Outbound notification dispatch.
    Notification,
    /// Generic call into an external service.
    ServiceIntegration,
    /// Application-defined kind.
    Custom(String),
}

impl TaskType {
    /// Creates a task type from a name, mapping well-known names to their variant.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Returns the stable string form.
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::DocumentAnalysis => "document_analysis",
            TaskType::BimAnalysis => "bim_analysis",
            TaskType::ComplianceCheck => "compliance_check",
            TaskType::TaskCreation => "task_creation",
            TaskType::Notification => "notification",
            TaskType::ServiceIntegration => "service_integration",
            TaskType::Custom(name) => name,
        }
    }
}

impl PartialEq for TaskType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TaskType {}

impl Hash for TaskType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<String> for TaskType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "document_analysis" => TaskType::DocumentAnalysis,
            "bim_analysis" => TaskType::BimAnalysis,
            "compliance_check" => TaskType::ComplianceCheck,
            "task_creation" => TaskType::TaskCreation,
            "notification" => TaskType::Notification,
            "service_integration" => TaskType::ServiceIntegration,
            _ => TaskType::Custom(name),
        }
    }
}

impl From<&str> for TaskType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<TaskType> for String {
    fn from(kind: TaskType) -> Self {
        match kind {
            TaskType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling tier of a task, fixed at creation.
///
/// Ordered so that `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    /// Returns [`Priority::Medium`].
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_tiers_are_ordered() {
        let mut tiers = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        tiers.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(
            tiers,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn well_known_names_map_to_variants() {
        assert_eq!(TaskType::custom("bim_analysis"), TaskType::BimAnalysis);
        assert_eq!(TaskType::from("demo"), TaskType::Custom("demo".into()));
        assert_eq!(TaskType::ComplianceCheck.to_string(), "compliance_check");
    }

    #[test]
    fn hand_built_custom_matches_well_known_variant() {
        use std::collections::HashSet;

        let spelled = TaskType::Custom("bim_analysis".into());
        assert_eq!(spelled, TaskType::BimAnalysis);
        let set: HashSet<TaskType> = [TaskType::BimAnalysis].into_iter().collect();
        assert!(set.contains(&spelled));
        assert_ne!(TaskType::Custom("bim".into()), TaskType::BimAnalysis);
    }

    #[test]
    fn task_type_serializes_as_string() {
        let json = serde_json::to_string(&TaskType::DocumentAnalysis).unwrap();
        assert_eq!(json, "\"document_analysis\"");
        let back: TaskType = serde_json::from_str("\"site_survey\"").unwrap();
        assert_eq!(back, TaskType::custom("site_survey"));
        let p: Priority = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(p, Priority::Critical);
    }
}
