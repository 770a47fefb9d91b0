//! `workflow_job` webhook payload.
//!
//! Only the fields the provisioner acts on are modelled. Unknown fields are
//! ignored so payload additions on GitHub's side never break parsing.

use serde::Deserialize;

/// Action carried by a `workflow_job` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    /// A job is waiting for a runner.
    Queued,
    /// Any other lifecycle action (`in_progress`, `completed`, `waiting`, ...).
    #[serde(other)]
    Other,
}

/// A parsed `workflow_job` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJobEvent {
    pub action: JobAction,
    pub workflow_job: WorkflowJob,
    #[serde(default)]
    pub organization: Option<Organization>,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub name: String,
    pub owner: Owner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

impl WorkflowJobEvent {
    /// Parse an event from the raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn job_id(&self) -> i64 {
        self.workflow_job.id
    }

    pub fn labels(&self) -> &[String] {
        &self.workflow_job.labels
    }

    /// `owner/name` as reported by GitHub; used as the rate-limit key.
    pub fn repo_full_name(&self) -> &str {
        &self.repository.full_name
    }

    pub fn owner_login(&self) -> &str {
        &self.repository.owner.login
    }

    pub fn repo_name(&self) -> &str {
        &self.repository.name
    }

    /// Returns true if any label equals `required` ignoring ASCII case.
    pub fn has_label(&self, required: &str) -> bool {
        self.workflow_job
            .labels
            .iter()
            .any(|label| label.eq_ignore_ascii_case(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUED: &str = r#"{
        "action": "queued",
        "workflow_job": {
            "id": 4242,
            "name": "build",
            "labels": ["Self-Hosted", "linux"]
        },
        "repository": {
            "full_name": "octo/widgets",
            "name": "widgets",
            "owner": { "login": "octo" }
        },
        "organization": { "login": "octo" },
        "sender": { "login": "someone" }
    }"#;

    #[test]
    fn test_queued_event_deserialization() {
        let event = WorkflowJobEvent::from_slice(QUEUED.as_bytes()).unwrap();
        assert_eq!(event.action, JobAction::Queued);
        assert_eq!(event.job_id(), 4242);
        assert_eq!(event.repo_full_name(), "octo/widgets");
        assert_eq!(event.owner_login(), "octo");
        assert_eq!(event.repo_name(), "widgets");
        assert_eq!(event.organization.as_ref().map(|o| o.login.as_str()), Some("octo"));
    }

    #[test]
    fn test_unknown_action_maps_to_other() {
        let body = QUEUED.replace("\"queued\"", "\"in_progress\"");
        let event = WorkflowJobEvent::from_slice(body.as_bytes()).unwrap();
        assert_eq!(event.action, JobAction::Other);
    }

    #[test]
    fn test_label_match_is_case_insensitive() {
        let event = WorkflowJobEvent::from_slice(QUEUED.as_bytes()).unwrap();
        assert!(event.has_label("self-hosted"));
        assert!(event.has_label("LINUX"));
        assert!(!event.has_label("gpu"));
    }

    #[test]
    fn test_missing_repository_is_rejected() {
        let body = r#"{"action":"queued","workflow_job":{"id":1,"labels":[]}}"#;
        assert!(WorkflowJobEvent::from_slice(body.as_bytes()).is_err());
    }
}
