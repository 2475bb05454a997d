use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::domain::{LocalFile, RepositoryName, TargetLocation};
use crate::error::RepodropError;
use crate::github::{bearer, body_message, endpoint};
use crate::session::Session;

pub const UPLOAD_FALLBACK: &str = "upload failed";
pub const UNREADABLE_ERROR_FALLBACK: &str = "failed to process the server error response";
pub const CACHE_FALLBACK: &str = "failed to create the cache file";

/// One upload transaction: every selected file, the destination and the
/// names flagged for server-side extraction.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRequest {
    pub files: Vec<LocalFile>,
    pub target: TargetLocation,
    pub extract: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReply {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

pub trait UploadBackend: Send + Sync {
    /// Creates a throwaway file so an empty repository gets its first commit.
    fn create_cache(&self, repo: &RepositoryName) -> Result<BackendReply, RepodropError>;
    fn upload(&self, request: &UploadRequest) -> Result<BackendReply, RepodropError>;
}

#[derive(Clone)]
pub struct BackendHttpClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl BackendHttpClient {
    pub fn new(config: &ResolvedConfig, session: Session) -> Result<Self, RepodropError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("repodrop/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| RepodropError::Network(err.to_string()))?,
        );
        // Uploads may legitimately take long; only the connect phase is bounded.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .timeout(None)
            .build()
            .map_err(|err| RepodropError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.backend_base_url.clone(),
            session,
        })
    }

    fn finish(
        &self,
        response: reqwest::blocking::Response,
        fallback: Fallback,
    ) -> Result<BackendReply, RepodropError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| RepodropError::Network(err.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(reject_backend(&self.session, status, &body, fallback));
        }
        if body.trim().is_empty() {
            return Ok(BackendReply::default());
        }
        serde_json::from_str(&body).map_err(|err| RepodropError::Decode(err.to_string()))
    }
}

impl UploadBackend for BackendHttpClient {
    fn create_cache(&self, repo: &RepositoryName) -> Result<BackendReply, RepodropError> {
        let token = self.session.require()?;
        let url = endpoint(&self.base_url, &["api", "create-cache"], &[])?;
        tracing::info!(repo = %repo, "backend.create_cache");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer(&token)?)
            .json(&cache_payload(repo))
            .send()
            .map_err(|err| RepodropError::Network(err.to_string()))?;
        self.finish(response, Fallback::Cache)
    }

    fn upload(&self, request: &UploadRequest) -> Result<BackendReply, RepodropError> {
        let token = self.session.require()?;
        let url = endpoint(&self.base_url, &["api", "upload"], &[])?;
        let form = upload_form(request)?;
        tracing::info!(
            repo = %request.target.repository,
            folder = %request.target.folder_path,
            files = request.files.len(),
            extract = request.extract.len(),
            "backend.upload"
        );
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer(&token)?)
            .multipart(form)
            .send()
            .map_err(|err| RepodropError::Network(err.to_string()))?;
        self.finish(response, Fallback::Upload)
    }
}

pub fn cache_payload(repo: &RepositoryName) -> Value {
    serde_json::json!({ "repo": repo.as_str() })
}

/// Text fields of the upload form, in submission order after the file parts.
pub fn upload_fields(request: &UploadRequest) -> Result<Vec<(&'static str, String)>, RepodropError> {
    let extract = serde_json::to_string(&request.extract)
        .map_err(|err| RepodropError::Decode(err.to_string()))?;
    Ok(vec![
        ("repo", request.target.repository.to_string()),
        ("folderPath", request.target.folder_path.clone()),
        ("extract", extract),
    ])
}

fn upload_form(request: &UploadRequest) -> Result<Form, RepodropError> {
    let mut form = Form::new();
    for file in &request.files {
        let part = Part::file(file.path.as_std_path())
            .map_err(|err| RepodropError::Filesystem(format!("{}: {err}", file.path)))?
            .file_name(file.name.clone());
        form = form.part("files", part);
    }
    for (name, value) in upload_fields(request)? {
        form = form.text(name, value);
    }
    Ok(form)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Upload,
    Cache,
}

pub fn reject_backend(
    session: &Session,
    status: u16,
    body: &str,
    fallback: Fallback,
) -> RepodropError {
    if status == 401 {
        session.clear();
        return RepodropError::AuthExpired;
    }
    let parsed = serde_json::from_str::<Value>(body).is_ok();
    let message = body_message(body).unwrap_or_else(|| {
        match (fallback, parsed) {
            (Fallback::Upload, false) => UNREADABLE_ERROR_FALLBACK,
            (Fallback::Upload, true) => UPLOAD_FALLBACK,
            (Fallback::Cache, _) => CACHE_FALLBACK,
        }
        .to_string()
    });
    RepodropError::BackendStatus { status, message }
}
