//! Instance bootstrap data rendering.
//!
//! The worker's startup script lives in a template file owned by the
//! deployment. Rendering is a pure function of [`BootstrapParams`]: each
//! `{{name}}` placeholder is replaced with the matching field, and a
//! template that still contains a placeholder afterwards is rejected.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read bootstrap template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unresolved placeholder in bootstrap template: {0}")]
    UnresolvedPlaceholder(String),
}

/// Values substituted into the bootstrap template.
///
/// Only references to secrets appear here, never secret values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapParams {
    pub runner_name: String,
    pub runner_token_secret: String,
    pub runner_labels: String,
    pub runner_owner: String,
    pub runner_repo: String,
    pub runner_version: String,
    pub callback_secret_ref: String,
    pub callback_url: String,
    /// Secret-store mount the references above live under.
    pub secret_mount: String,
}

impl BootstrapParams {
    fn placeholders(&self) -> [(&'static str, &str); 9] {
        [
            ("runner_name", &self.runner_name),
            ("runner_token_secret", &self.runner_token_secret),
            ("runner_labels", &self.runner_labels),
            ("runner_owner", &self.runner_owner),
            ("runner_repo", &self.runner_repo),
            ("runner_version", &self.runner_version),
            ("callback_secret_ref", &self.callback_secret_ref),
            ("callback_url", &self.callback_url),
            ("secret_mount", &self.secret_mount),
        ]
    }
}

/// Renders instance bootstrap data.
pub trait BootstrapRenderer: Send + Sync {
    fn render(&self, params: &BootstrapParams) -> Result<String, BootstrapError>;
}

/// Placeholder-substitution renderer over an in-memory template.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load the template from disk once, at startup.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|source| BootstrapError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(template))
    }
}

impl BootstrapRenderer for TemplateRenderer {
    fn render(&self, params: &BootstrapParams) -> Result<String, BootstrapError> {
        let mut rendered = self.template.clone();
        for (name, value) in params.placeholders() {
            rendered = rendered.replace(&format!("{{{{{name}}}}}"), value);
        }

        if let Some(start) = rendered.find("{{") {
            let rest = &rendered[start..];
            let end = rest.find("}}").map(|i| i + 2).unwrap_or(rest.len());
            return Err(BootstrapError::UnresolvedPlaceholder(rest[..end].to_string()));
        }

        Ok(rendered)
    }
}
