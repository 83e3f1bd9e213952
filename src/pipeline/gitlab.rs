//! GitLab REST API (v4) client.

use super::{CiClient, PipelineHandle, PipelineStatus, Variable};
use crate::config::GitLabConfig;
use crate::error::{ReleaseError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

pub const TOKEN_ENV: &str = "GITLAB_TOKEN";
pub const URI_ENV: &str = "GITLAB_URI";

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    id: u64,
    status: String,
    #[serde(default)]
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectVariable {
    value: String,
}

#[derive(Debug, Serialize)]
struct CreatePipelineRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    variables: &'a [Variable],
}

fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        return Err(ReleaseError::RemoteApi {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Blocking GitLab client authenticated with a private token
pub struct GitLabClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            ReleaseError::config(format!("invalid GitLab URI '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ReleaseError::config(format!(
                "invalid GitLab URI '{}'",
                base_url
            )));
        }

        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(GitLabClient {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Build a client from configuration. `GITLAB_URI` overrides the
    /// configured URI; the token is only read from `GITLAB_TOKEN`.
    pub fn from_config(config: &GitLabConfig) -> Result<Self> {
        let token = env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ReleaseError::config(format!("{} environment variable is not set", TOKEN_ENV))
            })?;

        let uri = env::var(URI_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| config.uri.clone())
            .ok_or_else(|| {
                ReleaseError::config(format!(
                    "GitLab URI is not configured (set [gitlab] uri or {})",
                    URI_ENV
                ))
            })?;

        Self::new(&uri, token, Duration::from_secs(config.request_timeout_secs))
    }

    /// `<base>/api/v4/projects/<url-encoded project>/<tail...>`
    fn project_url(&self, project: &str, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v4", "projects", project])
                .extend(tail);
        }
        url
    }
}

impl CiClient for GitLabClient {
    fn get_variable(&self, project: &str, key: &str) -> Result<Option<String>> {
        let url = self.project_url(project, &["variables", key]);
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let variable: ProjectVariable = read_json(response)?;
        Ok(Some(variable.value))
    }

    fn create_pipeline(
        &self,
        project: &str,
        git_ref: &str,
        variables: &[Variable],
    ) -> Result<PipelineHandle> {
        let url = self.project_url(project, &["pipeline"]);
        debug!(%url, git_ref, "POST");
        let response = self
            .client
            .post(url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&CreatePipelineRequest { git_ref, variables })
            .send()?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(ReleaseError::RemoteApi {
                status: status.as_u16(),
                body: response.text()?,
            });
        }

        let pipeline: PipelineResponse = read_json(response)?;
        Ok(PipelineHandle {
            id: pipeline.id,
            web_url: pipeline.web_url,
        })
    }

    fn pipeline_status(&self, project: &str, pipeline_id: u64) -> Result<PipelineStatus> {
        let id = pipeline_id.to_string();
        let url = self.project_url(project, &["pipelines", &id]);
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()?;

        let pipeline: PipelineResponse = read_json(response)?;
        debug!(project, pipeline = pipeline.id, status = %pipeline.status, "polled");
        Ok(PipelineStatus::from_api(&pipeline.status))
    }
}
