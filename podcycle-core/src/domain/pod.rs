//! Pod domain model
//!
//! A pod is the ephemeral worker started for each cycle. The manager only
//! knows its opaque identifier and the base URL derived from it.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the pod identifier in URL templates
pub const POD_ID_PLACEHOLDER: &str = "{pod_id}";

/// Reference to the pod owned by the current cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRef {
    /// Identifier returned by the provisioner
    pub id: String,

    /// Base URL of the pod's HTTP interface, without trailing slash
    pub url: String,
}

impl PodRef {
    /// Builds a pod reference by substituting `{pod_id}` in `template`
    pub fn from_template(id: impl Into<String>, template: &str) -> Self {
        let id = id.into();
        let url = template
            .replace(POD_ID_PLACEHOLDER, &id)
            .trim_end_matches('/')
            .to_string();
        Self { id, url }
    }
}

impl std::fmt::Display for PodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

/// Pod counts reported by the provisioner
///
/// Both keys are required; a payload missing either one does not deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCounts {
    pub total: u64,
    pub running: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_url_from_template() {
        let pod = PodRef::from_template("abc123", "https://{pod_id}-8080.proxy.runpod.net/");
        assert_eq!(pod.id, "abc123");
        assert_eq!(pod.url, "https://abc123-8080.proxy.runpod.net");
    }

    #[test]
    fn test_pod_counts_require_both_keys() {
        let counts: PodCounts = serde_json::from_str(r#"{"total": 2, "running": 1}"#).unwrap();
        assert_eq!(counts, PodCounts { total: 2, running: 1 });

        assert!(serde_json::from_str::<PodCounts>(r#"{"total": 2}"#).is_err());
        assert!(serde_json::from_str::<PodCounts>(r#""two""#).is_err());
    }
}
