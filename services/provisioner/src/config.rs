//! Provisioner configuration (env-driven).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use ghr_github::SecretToken;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CALLBACK_SECRET_PATH: &str = "/github-runners/callback-secret";
const DEFAULT_MAX_CONCURRENT: usize = 10;
const DEFAULT_MAX_PER_REPO_PER_MIN: usize = 20;
const DEFAULT_PROVISION_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REAPER_MAX_AGE_SECS: u64 = 3600;
const DEFAULT_REAPER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address.
    pub listen_addr: SocketAddr,

    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,

    pub github: GitHubConfig,
    pub digitalocean: DigitalOceanSettings,
    pub vault: VaultConfig,
    pub runner: RunnerConfig,
    pub limits: LimitsConfig,
    pub reaper: ReaperSettings,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub app_id: u64,
    pub installation_id: u64,
    pub private_key_file: PathBuf,
    pub webhook_secret: SecretToken,
}

#[derive(Debug, Clone)]
pub struct DigitalOceanSettings {
    pub token: SecretToken,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_fingerprints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub addr: String,
    pub token: SecretToken,
    pub mount: String,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub cloud_init_path: PathBuf,
    pub version: String,
    pub required_label: String,
    pub token_prefix: String,
    pub callback_url: String,
    pub callback_secret: SecretToken,
    pub callback_secret_path: String,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_concurrent: usize,
    pub max_per_repo_per_min: usize,
    pub provision_timeout: Duration,
    pub callback_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ReaperSettings {
    pub max_age: Duration,
    /// In-process sweep interval; `None` leaves sweeping to the `cleanup` binary.
    pub interval: Option<Duration>,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let listen_addr = env
            .first(&["GHR_LISTEN_ADDR", "LISTEN_ADDR"])
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = parse_listen_addr(&listen_addr)
            .context("GHR_LISTEN_ADDR must be a socket address (example: 0.0.0.0:8080).")?;

        let log_level = env.or("GHR_LOG_LEVEL", "info");

        let github = GitHubConfig {
            app_id: env.required_parse("APP_ID")?,
            installation_id: env.required_parse("APP_INSTALLATION_ID")?,
            private_key_file: PathBuf::from(env.required("APP_PRIVATE_KEY_FILE")?),
            webhook_secret: SecretToken::new(env.required("WEBHOOK_SECRET")?),
        };

        let digitalocean = DigitalOceanSettings {
            token: SecretToken::new(env.required("DIGITALOCEAN_TOKEN")?),
            region: env.or("DO_REGION", "nyc3"),
            size: env.or("DO_SIZE", "s-4vcpu-8gb"),
            image: env.or("DO_IMAGE", "ubuntu-24-04-x64"),
            ssh_fingerprints: env
                .get("DO_SSH_FINGERPRINTS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        };

        let vault = VaultConfig {
            addr: env.required("VAULT_ADDR")?,
            token: SecretToken::new(env.required("VAULT_TOKEN")?),
            mount: env.or("VAULT_MOUNT", "secret"),
        };

        let runner = RunnerConfig {
            cloud_init_path: PathBuf::from(
                env.or("CLOUD_INIT_PATH", "cloud-init/runner.yaml.tmpl"),
            ),
            version: env.or("RUNNER_VERSION", "2.331.0"),
            required_label: env.or("REQUIRED_LABEL", "self-hosted"),
            token_prefix: env.or("RUNNER_TOKEN_PREFIX", "/github-runners/tokens"),
            callback_url: env.required("CALLBACK_URL")?,
            callback_secret: SecretToken::new(env.required("CALLBACK_SECRET")?),
            callback_secret_path: env
                .first(&["CALLBACK_SECRET_PATH", "CALLBACK_SECRET_SSM_PATH"])
                .unwrap_or_else(|| DEFAULT_CALLBACK_SECRET_PATH.to_string()),
        };

        let limits = LimitsConfig {
            max_concurrent: env.positive("MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT as i64)?
                as usize,
            max_per_repo_per_min: env
                .positive("MAX_PER_REPO_PER_MIN", DEFAULT_MAX_PER_REPO_PER_MIN as i64)?
                as usize,
            provision_timeout: env
                .seconds("PROVISION_TIMEOUT_SECS", DEFAULT_PROVISION_TIMEOUT_SECS)?,
            callback_timeout: env
                .seconds("CALLBACK_TIMEOUT_SECS", DEFAULT_CALLBACK_TIMEOUT_SECS)?,
        };

        let reaper = ReaperSettings {
            max_age: env.seconds("REAPER_MAX_AGE_SECS", DEFAULT_REAPER_MAX_AGE_SECS)?,
            interval: match env.parse::<i64>("REAPER_INTERVAL_SECS")? {
                Some(secs) if secs > 0 => Some(Duration::from_secs(secs as u64)),
                _ => None,
            },
            timeout: env.seconds("REAPER_TIMEOUT_SECS", DEFAULT_REAPER_TIMEOUT_SECS)?,
        };

        Ok(Self {
            listen_addr,
            log_level,
            github,
            digitalocean,
            vault,
            runner,
            limits,
            reaper,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("Missing required environment variable {key}."))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(key)
            .map(|v| v.parse::<T>())
            .transpose()
            .with_context(|| format!("{key} has an invalid value."))
    }

    fn required_parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.parse(key)?
            .with_context(|| format!("Missing required environment variable {key}."))
    }

    /// Integer setting where zero or negative values mean "use the default".
    fn positive(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .parse::<i64>(key)?
            .filter(|v| *v > 0)
            .unwrap_or(default))
    }

    fn seconds(&self, key: &str, default: u64) -> Result<Duration> {
        let secs = self.positive(key, default as i64)?;
        Ok(Duration::from_secs(secs as u64))
    }
}

/// Accepts a bare `:port` as shorthand for all interfaces.
fn parse_listen_addr(value: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}").parse(),
        None => value.parse(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
