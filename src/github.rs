use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::domain::{RemoteEntry, Repository, RepositoryName, User};
use crate::error::RepodropError;
use crate::session::Session;

pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
pub const REPOSITORIES_PER_PAGE: &str = "100";

pub trait HostingApi: Send + Sync {
    fn current_user(&self) -> Result<User, RepodropError>;
    /// First page only, most recently pushed first.
    fn list_repositories(&self) -> Result<Vec<Repository>, RepodropError>;
    /// Children of `path` (`""` = repository root).
    fn list_contents(
        &self,
        repo: &RepositoryName,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, RepodropError>;
}

#[derive(Clone)]
pub struct GithubHttpClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl GithubHttpClient {
    pub fn new(config: &ResolvedConfig, session: Session) -> Result<Self, RepodropError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("repodrop/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| RepodropError::Network(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| RepodropError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
        })
    }

    /// Authenticated GET against the hosting API. Path segments are
    /// percent-encoded individually.
    pub fn call(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, RepodropError> {
        let token = self.session.require()?;
        let url = endpoint(&self.base_url, segments, query)?;
        tracing::debug!(%url, "github.request");

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer(&token)?)
            .send()
            .map_err(|err| RepodropError::Network(err.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            tracing::debug!(status, "github.response rejected");
            return Err(reject(&self.session, status, &body, github_fallback));
        }
        response
            .json()
            .map_err(|err| RepodropError::Decode(err.to_string()))
    }

    fn call_as<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, RepodropError> {
        let value = self.call(segments, query)?;
        serde_json::from_value(value).map_err(|err| RepodropError::Decode(err.to_string()))
    }
}

impl HostingApi for GithubHttpClient {
    fn current_user(&self) -> Result<User, RepodropError> {
        self.call_as(&["user"], &[])
    }

    fn list_repositories(&self) -> Result<Vec<Repository>, RepodropError> {
        self.call_as(
            &["user", "repos"],
            &[("sort", "pushed"), ("per_page", REPOSITORIES_PER_PAGE)],
        )
    }

    fn list_contents(
        &self,
        repo: &RepositoryName,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, RepodropError> {
        let segments = contents_segments(repo, path);
        let segments = segments.iter().map(String::as_str).collect::<Vec<_>>();
        let value = self.call(&segments, &[])?;
        parse_contents(value)
    }
}

pub fn contents_segments(repo: &RepositoryName, path: &str) -> Vec<String> {
    let mut segments = vec![
        "repos".to_string(),
        repo.owner().to_string(),
        repo.name().to_string(),
        "contents".to_string(),
    ];
    segments.extend(
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
    );
    segments
}

/// A directory listing is an array; a file path yields a single object.
pub fn parse_contents(value: Value) -> Result<Vec<RemoteEntry>, RepodropError> {
    let value = match value {
        Value::Array(_) => value,
        Value::Object(_) => Value::Array(vec![value]),
        other => {
            return Err(RepodropError::Decode(format!(
                "expected contents listing, got {other}"
            )));
        }
    };
    serde_json::from_value(value).map_err(|err| RepodropError::Decode(err.to_string()))
}

pub(crate) fn endpoint(
    base_url: &str,
    segments: &[&str],
    query: &[(&str, &str)],
) -> Result<Url, RepodropError> {
    let mut url = Url::parse(base_url).map_err(|err| RepodropError::Network(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| RepodropError::Network(format!("{base_url} cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

pub(crate) fn bearer(token: &str) -> Result<HeaderValue, RepodropError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| RepodropError::MissingToken)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Best-effort `message` from a JSON error body.
pub fn body_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

fn github_fallback(status: u16) -> String {
    format!("GitHub API Error: {status}")
}

/// Converts a rejected response into a typed error. A 401 discards the
/// session before the error is returned; it is never retried.
pub(crate) fn reject(
    session: &Session,
    status: u16,
    body: &str,
    fallback: fn(u16) -> String,
) -> RepodropError {
    if status == 401 {
        session.clear();
        return RepodropError::AuthExpired;
    }
    let message = body_message(body).unwrap_or_else(|| fallback(status));
    if status == 404 {
        return RepodropError::NotFound { message };
    }
    RepodropError::RemoteStatus { status, message }
}
