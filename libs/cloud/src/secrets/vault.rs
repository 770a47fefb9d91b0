//! HashiCorp Vault KV v2 secret store.
//!
//! Secrets are written as `{"value": "..."}` at `{mount}/data/{name}` and
//! removed (all versions) through `{mount}/metadata/{name}`. Leading slashes
//! in the name are dropped, so `/github-runners/tokens/x` lands at
//! `secret/data/github-runners/tokens/x`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use super::{SecretStore, SecretStoreError};

const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Serialize)]
struct WriteBody<'a> {
    data: WriteData<'a>,
}

#[derive(Serialize)]
struct WriteData<'a> {
    value: &'a str,
}

pub struct VaultKvStore {
    client: reqwest::Client,
    addr: String,
    mount: String,
    token: String,
}

impl VaultKvStore {
    pub fn new(
        addr: impl Into<String>,
        mount: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, SecretStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SecretStoreError::Client(e.to_string()))?;

        Ok(Self {
            client,
            addr: addr.into().trim_end_matches('/').to_string(),
            mount: mount.into().trim_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Path of `name` as the `vault kv` CLI addresses it (`{mount}/{name}`).
    pub fn secret_path(&self, name: &str) -> Result<String, SecretStoreError> {
        Ok(format!("{}/{}", self.mount, relative(name)?))
    }

    fn url(&self, kind: &str, name: &str) -> Result<String, SecretStoreError> {
        Ok(format!(
            "{}/v1/{}/{}/{}",
            self.addr,
            self.mount,
            kind,
            relative(name)?
        ))
    }
}

fn relative(name: &str) -> Result<&str, SecretStoreError> {
    let path = name.trim_start_matches('/');
    if path.is_empty() || path.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return Err(SecretStoreError::InvalidName(name.to_string()));
    }
    Ok(path)
}

#[async_trait]
impl SecretStore for VaultKvStore {
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        let url = self.url("data", name)?;
        debug!(secret = %name, "Writing secret");

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&WriteBody {
                data: WriteData { value },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SecretStoreError::Api {
                name: name.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        let url = self.url("metadata", name)?;
        debug!(secret = %name, "Deleting secret");

        let response = self
            .client
            .delete(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(SecretStoreError::Api {
                name: name.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}
