use std::cmp::Ordering;

use serde::Serialize;

use crate::domain::{RemoteEntry, RepositoryName, normalize_folder_path};
use crate::error::RepodropError;
use crate::github::HostingApi;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Listing {
    Entries(Vec<RemoteEntry>),
    /// The path does not exist remotely, which is how empty folders show up.
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserView {
    pub repository: RepositoryName,
    pub path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub listing: Listing,
}

impl BrowserView {
    pub fn entries(&self) -> &[RemoteEntry] {
        match &self.listing {
            Listing::Entries(entries) => entries,
            _ => &[],
        }
    }
}

/// Navigates one repository's folder tree. Every navigation re-fetches.
#[derive(Debug, Clone)]
pub struct DirectoryBrowser {
    repository: RepositoryName,
    current_path: String,
}

impl DirectoryBrowser {
    pub fn new(repository: RepositoryName) -> Self {
        Self {
            repository,
            current_path: String::new(),
        }
    }

    pub fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Only an expired session is returned as an error; every other failure
    /// is rendered inside the view.
    pub fn open(
        &mut self,
        api: &dyn HostingApi,
        path: &str,
    ) -> Result<BrowserView, RepodropError> {
        let path = normalize_folder_path(path)?;
        self.current_path = path.clone();

        let listing = match api.list_contents(&self.repository, &path) {
            Ok(mut entries) => {
                sort_entries(&mut entries);
                Listing::Entries(entries)
            }
            Err(err) if err.is_auth_expired() => return Err(err),
            Err(err) if err.is_not_found() => Listing::Empty,
            Err(err) => {
                tracing::warn!(repo = %self.repository, path = %path, "listing failed: {err}");
                Listing::Failed(err.user_message())
            }
        };

        Ok(BrowserView {
            repository: self.repository.clone(),
            breadcrumbs: breadcrumbs(&path),
            path,
            listing,
        })
    }

    pub fn enter(
        &mut self,
        api: &dyn HostingApi,
        entry: &RemoteEntry,
    ) -> Result<Option<BrowserView>, RepodropError> {
        if !entry.is_dir() {
            return Ok(None);
        }
        self.open(api, &entry.path).map(Some)
    }

    pub fn parent(&mut self, api: &dyn HostingApi) -> Result<BrowserView, RepodropError> {
        let parent = parent_path(&self.current_path).to_string();
        self.open(api, &parent)
    }

    pub fn select_directory(&self) -> String {
        self.current_path.clone()
    }
}

/// Directories first, then by name. Byte-wise comparison keeps the order
/// deterministic across locales.
pub fn sort_entries(entries: &mut [RemoteEntry]) {
    entries.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        label: "root".to_string(),
        path: String::new(),
    }];
    let mut acc = String::new();
    for part in path.split('/').filter(|part| !part.is_empty()) {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(part);
        crumbs.push(Breadcrumb {
            label: part.to_string(),
            path: acc.clone(),
        });
    }
    crumbs
}

pub fn parent_path(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    }
}
