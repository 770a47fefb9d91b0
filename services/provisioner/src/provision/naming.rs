//! Name validation, runner naming and label sanitization.

use chrono::{DateTime, Utc};

/// Provider hostname limit.
pub const MAX_RUNNER_NAME_LEN: usize = 63;

const RUNNER_NAME_PREFIX: &str = "eph";

/// Alphanumeric, `-` and `_` only; non-empty.
pub fn is_safe_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// `owner/repo` where each side is alphanumeric, `.`, `-` or `_`.
pub fn is_valid_repo_full_name(value: &str) -> bool {
    let segment_ok = |s: &str| {
        !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
    };
    match value.split_once('/') {
        Some((owner, repo)) => segment_ok(owner) && segment_ok(repo),
        None => false,
    }
}

/// Build the runner (and instance) name for a job.
///
/// The name is `eph-{repo}-{job_id}-{unix_seconds}`. When it would exceed
/// [`MAX_RUNNER_NAME_LEN`] the repository part is shortened, never the job id
/// or timestamp, so names for the same job at different seconds stay
/// distinct. Underscores become hyphens because provider hostnames reject
/// them. `repo` must already satisfy [`is_safe_name`].
pub fn runner_name(repo: &str, job_id: i64, at: DateTime<Utc>) -> String {
    let suffix = format!("-{}-{}", job_id, at.timestamp());
    let budget = MAX_RUNNER_NAME_LEN
        .saturating_sub(RUNNER_NAME_PREFIX.len() + 1)
        .saturating_sub(suffix.len());

    let repo: String = repo
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '_' { '-' } else { c })
        .take(budget)
        .collect();
    let repo = repo.trim_end_matches('-');

    let mut name = if repo.is_empty() {
        format!("{RUNNER_NAME_PREFIX}{suffix}")
    } else {
        format!("{RUNNER_NAME_PREFIX}-{repo}{suffix}")
    };
    name.truncate(MAX_RUNNER_NAME_LEN);
    name
}

/// Trim each label and keep those that pass [`is_safe_name`], in order.
pub fn sanitize_labels(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| is_safe_name(label))
        .map(str::to_string)
        .collect()
}

/// Secret-store name holding the registration token for `runner_name`.
pub fn token_secret_name(prefix: &str, runner_name: &str) -> String {
    format!("/{}/{}", prefix.trim_matches('/'), runner_name)
}
