//! Pages API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::cmp::Reverse;
use std::time::Duration;

use pagepush_protocol::{
    Account, ApiEnvelope, AssetUploadEntry, CreateProjectRequest, Deployment, Manifest, Project,
    UploadTokenResult, UpsertHashesRequest,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{ClientError, ErrorKind};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Name used when a project has to be created on the fly.
pub const DEFAULT_PROJECT_NAME: &str = "cdn";

/// Production branch of projects created on the fly.
pub const PRODUCTION_BRANCH: &str = "production";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings for [`PagesClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API token used for account and project endpoints.
    pub api_token: String,
    pub base_url: String,
    /// Per-request timeout, covering large bucket uploads.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Pages API client.
#[derive(Clone)]
pub struct PagesClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl PagesClient {
    /// Creates a new client.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
        })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        debug!(%method, endpoint, "pages request");
        self.http
            .request(method, format!("{}{}", self.base_url, endpoint))
    }

    /// Sends a request and unwraps the envelope's `result`.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        self.send_as(req, ErrorKind::Fatal).await
    }

    /// Like [`send`](Self::send), reporting an unsuccessful envelope on a
    /// 2xx response as `unsuccessful`.
    async fn send_as<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        unsuccessful: ErrorKind,
    ) -> Result<T, ClientError> {
        let envelope: ApiEnvelope<T> = self.send_envelope(req).await?;
        envelope
            .into_result()
            .map_err(|e| ClientError::new(unsuccessful, e.to_string()))
    }

    /// Sends a request whose result payload is irrelevant.
    async fn send_unit(&self, req: RequestBuilder) -> Result<(), ClientError> {
        let envelope: ApiEnvelope<serde_json::Value> = self.send_envelope(req).await?;
        envelope
            .ensure_success()
            .map_err(|e| ClientError::fatal(e.to_string()))
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .map(|env| env.error_summary())
                .filter(|summary| !summary.is_empty())
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(ClientError::from_response(status, message));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    // -----------------------------------------------------------------------
    // Accounts and projects
    // -----------------------------------------------------------------------

    /// Lists the accounts visible to the API token.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, ClientError> {
        let req = self
            .request(Method::GET, "/accounts")
            .bearer_auth(&self.api_token);
        self.send(req).await
    }

    /// Returns the first account, or the first whose name contains
    /// `name_filter` (case-insensitive).
    pub async fn resolve_account_id(&self, name_filter: Option<&str>) -> Result<String, ClientError> {
        let accounts = self.list_accounts().await?;
        let account = match name_filter {
            None => accounts.into_iter().next(),
            Some(filter) => {
                let filter = filter.to_lowercase();
                accounts
                    .into_iter()
                    .find(|a| a.name.to_lowercase().contains(&filter))
            }
        };
        account
            .map(|a| a.id)
            .ok_or_else(|| ClientError::fatal("account not found"))
    }

    /// Lists the account's projects, newest first.
    pub async fn list_projects(&self, account_id: &str) -> Result<Vec<Project>, ClientError> {
        let req = self
            .request(Method::GET, &format!("/accounts/{account_id}/pages/projects"))
            .bearer_auth(&self.api_token);
        let mut projects: Vec<Project> = self.send(req).await?;
        projects.sort_by_key(|p| {
            Reverse(
                p.created_on
                    .as_deref()
                    .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok()),
            )
        });
        Ok(projects)
    }

    /// Creates a project with the `production` branch.
    pub async fn create_project(&self, account_id: &str, name: &str) -> Result<Project, ClientError> {
        info!(project = name, "creating pages project");
        let body = CreateProjectRequest {
            name: name.to_string(),
            production_branch: PRODUCTION_BRANCH.to_string(),
        };
        let req = self
            .request(Method::POST, &format!("/accounts/{account_id}/pages/projects"))
            .bearer_auth(&self.api_token)
            .json(&body);
        self.send(req).await
    }

    /// Returns the newest project's name, creating [`DEFAULT_PROJECT_NAME`]
    /// when the account has none.
    pub async fn resolve_project_name(&self, account_id: &str) -> Result<String, ClientError> {
        let projects = self.list_projects(account_id).await?;
        match projects.into_iter().next() {
            Some(project) => Ok(project.name),
            None => Ok(self
                .create_project(account_id, DEFAULT_PROJECT_NAME)
                .await?
                .name),
        }
    }

    /// Binds the client to one deployment target.
    pub fn project(self, account_id: impl Into<String>, project_name: impl Into<String>) -> ProjectClient {
        ProjectClient {
            client: self,
            account_id: account_id.into(),
            project_name: project_name.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Assets and deployments
    // -----------------------------------------------------------------------

    /// Issues an upload JWT scoped to one project.
    pub async fn fetch_upload_token(&self, account_id: &str, project_name: &str) -> Result<String, ClientError> {
        let req = self
            .request(
                Method::GET,
                &format!("/accounts/{account_id}/pages/projects/{project_name}/upload-token"),
            )
            .bearer_auth(&self.api_token);
        let result: UploadTokenResult = self.send(req).await?;
        Ok(result.jwt)
    }

    /// Uploads one bucket of assets. The bucket is accepted or rejected as a whole.
    pub async fn upload_assets(&self, jwt: &str, entries: &[AssetUploadEntry]) -> Result<(), ClientError> {
        let req = self
            .request(Method::POST, "/pages/assets/upload")
            .bearer_auth(jwt)
            .json(entries);
        self.send_unit(req).await
    }

    /// Marks fingerprints as present for future deployments.
    pub async fn upsert_hashes(&self, jwt: &str, hashes: &[String]) -> Result<(), ClientError> {
        let body = UpsertHashesRequest {
            hashes: hashes.to_vec(),
        };
        let req = self
            .request(Method::POST, "/pages/assets/upsert-hashes")
            .bearer_auth(jwt)
            .json(&body);
        self.send_unit(req).await
    }

    /// Commits a manifest as a new deployment on `branch`.
    pub async fn create_deployment(
        &self,
        account_id: &str,
        project_name: &str,
        manifest: &Manifest,
        branch: &str,
    ) -> Result<Deployment, ClientError> {
        let form = reqwest::multipart::Form::new()
            .text("manifest", manifest.to_json()?)
            .text("branch", branch.to_string());
        let req = self
            .request(
                Method::POST,
                &format!("/accounts/{account_id}/pages/projects/{project_name}/deployments"),
            )
            .bearer_auth(&self.api_token)
            .multipart(form);
        // The service answers some failed submissions with a 2xx body;
        // those are worth another attempt.
        self.send_as(req, ErrorKind::Transient).await
    }
}

/// A [`PagesClient`] bound to one account and project.
#[derive(Clone)]
pub struct ProjectClient {
    client: PagesClient,
    account_id: String,
    project_name: String,
}

impl ProjectClient {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub async fn fetch_upload_token(&self) -> Result<String, ClientError> {
        self.client
            .fetch_upload_token(&self.account_id, &self.project_name)
            .await
    }

    pub async fn upload_assets(&self, jwt: &str, entries: &[AssetUploadEntry]) -> Result<(), ClientError> {
        self.client.upload_assets(jwt, entries).await
    }

    pub async fn upsert_hashes(&self, jwt: &str, hashes: &[String]) -> Result<(), ClientError> {
        self.client.upsert_hashes(jwt, hashes).await
    }

    pub async fn create_deployment(&self, manifest: &Manifest, branch: &str) -> Result<Deployment, ClientError> {
        self.client
            .create_deployment(&self.account_id, &self.project_name, manifest, branch)
            .await
    }
}
