//! Pod template extraction for workload controllers.
use serde_json::Value;

use crate::error::{GatekeeperError, Result};

const POD_TEMPLATE_PATH: &[&str] = &["spec", "template"];
const CRONJOB_TEMPLATE_PATH: &[&str] = &["spec", "jobTemplate", "spec", "template"];

/// Kinds that embed a pod template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    DaemonSet,
    ReplicaSet,
    Job,
    StatefulSet,
    Deployment,
    CronJob,
}

impl WorkloadKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "DaemonSet" => Some(WorkloadKind::DaemonSet),
            "ReplicaSet" => Some(WorkloadKind::ReplicaSet),
            "Job" => Some(WorkloadKind::Job),
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            "Deployment" => Some(WorkloadKind::Deployment),
            "CronJob" => Some(WorkloadKind::CronJob),
            _ => None,
        }
    }

    pub fn template_path(self) -> &'static [&'static str] {
        match self {
            WorkloadKind::CronJob => CRONJOB_TEMPLATE_PATH,
            _ => POD_TEMPLATE_PATH,
        }
    }
}

/// Locate the pod template of a workload document.
///
/// Returns `Ok(None)` for kinds outside the workload set. For workload kinds
/// every step of the path must be a mapping holding the next key; otherwise
/// the document is reported as [`GatekeeperError::MalformedWorkload`].
pub fn extract<'a>(kind: &str, tree: &'a Value) -> Result<Option<&'a Value>> {
    let Some(workload) = WorkloadKind::from_kind(kind) else {
        return Ok(None);
    };
    let path = workload.template_path();
    let mut current = tree;
    for (depth, key) in path.iter().enumerate() {
        let map = current.as_object().ok_or_else(|| {
            let reason = format!("expected a mapping, found {}", type_name(current));
            malformed(kind, &path[..depth], reason)
        })?;
        current = map
            .get(*key)
            .ok_or_else(|| malformed(kind, &path[..=depth], "missing".to_string()))?;
    }
    Ok(Some(current))
}

fn malformed(kind: &str, path: &[&str], reason: String) -> GatekeeperError {
    let path = if path.is_empty() {
        "<document>".to_string()
    } else {
        path.join(".")
    };
    GatekeeperError::MalformedWorkload {
        kind: kind.to_string(),
        path,
        reason,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_spec_template_for_controllers() {
        for kind in ["DaemonSet", "ReplicaSet", "Job", "StatefulSet", "Deployment"] {
            let doc = json!({"kind": kind, "spec": {"template": {"spec": {"containers": []}}}});
            let template = extract(kind, &doc).expect("extract").expect("template");
            assert_eq!(template, &json!({"spec": {"containers": []}}), "{kind}");
        }
    }

    #[test]
    fn cronjob_uses_job_template_path() {
        let doc = json!({
            "kind": "CronJob",
            "spec": {
                "template": {"decoy": true},
                "jobTemplate": {"spec": {"template": {"spec": {"containers": []}}}}
            }
        });
        let template = extract("CronJob", &doc).expect("extract").expect("template");
        assert_eq!(template, &json!({"spec": {"containers": []}}));
    }

    #[test]
    fn other_kinds_have_no_template() {
        let doc = json!({"kind": "Pod", "spec": {"template": {}}});
        assert!(extract("Pod", &doc).expect("extract").is_none());
        assert!(extract("", &doc).expect("extract").is_none());
        assert!(extract("deployment", &doc).expect("extract").is_none());
    }

    #[test]
    fn missing_template_is_malformed() {
        let doc = json!({"kind": "Deployment", "spec": {"replicas": 1}});
        match extract("Deployment", &doc) {
            Err(GatekeeperError::MalformedWorkload { kind, path, .. }) => {
                assert_eq!(kind, "Deployment");
                assert_eq!(path, "spec.template");
            }
            other => panic!("expected MalformedWorkload, got {other:?}"),
        }
    }

    #[test]
    fn non_mapping_intermediate_is_malformed() {
        let doc = json!({"kind": "CronJob", "spec": {"jobTemplate": ["not", "a", "map"]}});
        match extract("CronJob", &doc) {
            Err(GatekeeperError::MalformedWorkload { path, reason, .. }) => {
                assert_eq!(path, "spec.jobTemplate");
                assert!(reason.contains("a list"), "{reason}");
            }
            other => panic!("expected MalformedWorkload, got {other:?}"),
        }
    }

    #[test]
    fn non_mapping_document_is_malformed() {
        let doc = json!("Deployment");
        match extract("Deployment", &doc) {
            Err(GatekeeperError::MalformedWorkload { path, .. }) => assert_eq!(path, "<document>"),
            other => panic!("expected MalformedWorkload, got {other:?}"),
        }
    }

    #[test]
    fn null_template_is_passed_through() {
        let doc = json!({"kind": "Job", "spec": {"template": null}});
        assert_eq!(extract("Job", &doc).expect("extract"), Some(&Value::Null));
    }
}
