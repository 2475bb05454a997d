//! Upload orchestration.
//!
//! One [`Workflow`] drives one upload cycle at a time:
//!
//! ```text
//! Idle -> SelectingRepo -> CheckingEmptiness -> BrowsingFolder
//!      -> SelectingExtraction -> [CachePrompt] -> Uploading -> Idle
//! ```
//!
//! Every operation is a transition that either rejects the call
//! (`InvalidTransition`, nothing changes) or returns a [`Step`] describing the
//! new stage and the screen to render. Remote failures are turned into screens
//! and toasts here; an expired session always lands on [`Screen::Login`].

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::backend::{UploadBackend, UploadRequest};
use crate::browser::{BrowserView, DirectoryBrowser};
use crate::config::ResolvedConfig;
use crate::domain::{LocalFile, Repository, RepositoryName, TargetLocation};
use crate::error::RepodropError;
use crate::extract::ExtractionSelector;
use crate::github::HostingApi;
use crate::join::with_minimum_duration;
use crate::session::Session;
use crate::view::{ExtractionItem, ExtractionView, RepoPicker, Screen, Toast};

pub const REPOSITORIES_FAILED: &str = "Failed to load repositories.";
pub const UPLOAD_SUCCEEDED: &str = "Upload succeeded!";
pub const CACHE_CREATED: &str = "Cache file created!";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

fn phase(message: impl Into<String>) -> ProgressEvent {
    ProgressEvent {
        message: message.into(),
        elapsed: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    SelectingRepo,
    CheckingEmptiness,
    BrowsingFolder,
    SelectingExtraction,
    CachePrompt,
    Uploading,
    BootstrapFailed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "idle",
            Stage::SelectingRepo => "selecting a repository",
            Stage::CheckingEmptiness => "checking the repository",
            Stage::BrowsingFolder => "browsing folders",
            Stage::SelectingExtraction => "selecting archives to extract",
            Stage::CachePrompt => "asking about the cache file",
            Stage::Uploading => "uploading",
            Stage::BootstrapFailed => "cache bootstrap failed",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "message", rename_all = "snake_case")]
pub enum UploadOutcome {
    Done,
    Failed(String),
}

/// Result of a transition: the stage reached and what to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub stage: Stage,
    pub screen: Screen,
    pub toasts: Vec<Toast>,
    pub outcome: Option<UploadOutcome>,
}

impl Step {
    fn new(stage: Stage, screen: Screen) -> Self {
        Self {
            stage,
            screen,
            toasts: Vec::new(),
            outcome: None,
        }
    }

    fn with_toast(mut self, toast: Toast) -> Self {
        self.toasts.push(toast);
        self
    }
}

/// Everything collected during one upload cycle.
#[derive(Debug, Clone, Default)]
pub struct UploadCycle {
    files: Vec<LocalFile>,
    repositories: Vec<Repository>,
    repositories_error: Option<String>,
    browser: Option<DirectoryBrowser>,
    view: Option<BrowserView>,
    repository_empty: Option<bool>,
    target: Option<TargetLocation>,
    extraction: ExtractionSelector,
    extract: Vec<String>,
    bootstrap_error: Option<String>,
}

impl UploadCycle {
    pub fn files(&self) -> &[LocalFile] {
        &self.files
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn repository(&self) -> Option<&RepositoryName> {
        self.browser.as_ref().map(DirectoryBrowser::repository)
    }

    pub fn repository_empty(&self) -> Option<bool> {
        self.repository_empty
    }

    pub fn browser_view(&self) -> Option<&BrowserView> {
        self.view.as_ref()
    }

    pub fn target(&self) -> Option<&TargetLocation> {
        self.target.as_ref()
    }

    pub fn extraction(&self) -> &ExtractionSelector {
        &self.extraction
    }

    pub fn extract_list(&self) -> &[String] {
        &self.extract
    }

    /// Drops every decision but keeps the file selection.
    fn abort(&mut self) {
        let files = std::mem::take(&mut self.files);
        *self = Self {
            files,
            ..Self::default()
        };
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub min_upload_display: Duration,
    pub bootstrap_help_url: String,
}

impl From<&ResolvedConfig> for WorkflowOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            min_upload_display: config.min_upload_display,
            bootstrap_help_url: config.bootstrap_help_url.clone(),
        }
    }
}

pub struct Workflow<H: HostingApi, B: UploadBackend> {
    api: H,
    backend: B,
    session: Session,
    options: WorkflowOptions,
    stage: Stage,
    cycle: UploadCycle,
}

impl<H: HostingApi, B: UploadBackend> Workflow<H, B> {
    pub fn new(api: H, backend: B, session: Session, options: WorkflowOptions) -> Self {
        Self {
            api,
            backend,
            session,
            options,
            stage: Stage::Idle,
            cycle: UploadCycle::default(),
        }
    }

    pub fn api(&self) -> &H {
        &self.api
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn cycle(&self) -> &UploadCycle {
        &self.cycle
    }

    /// Projection of the current state.
    pub fn screen(&self) -> Screen {
        if !self.session.is_authenticated() {
            return Screen::Login;
        }
        match self.stage {
            Stage::Idle => Screen::Dashboard {
                files: self.cycle.files.clone(),
            },
            Stage::SelectingRepo | Stage::CheckingEmptiness => Screen::RepoPicker(RepoPicker {
                repositories: self.cycle.repositories.clone(),
                error: self.cycle.repositories_error.clone(),
            }),
            Stage::BrowsingFolder => match &self.cycle.view {
                Some(view) => Screen::Browser(view.clone()),
                None => Screen::Dashboard {
                    files: self.cycle.files.clone(),
                },
            },
            Stage::SelectingExtraction => Screen::Extraction(extraction_view(&self.cycle.extraction)),
            Stage::CachePrompt => match &self.cycle.target {
                Some(target) => Screen::CachePrompt {
                    repository: target.repository.clone(),
                },
                None => Screen::Dashboard {
                    files: self.cycle.files.clone(),
                },
            },
            Stage::Uploading => Screen::Uploading {
                status: uploading_status(self.cycle.files.len()),
            },
            Stage::BootstrapFailed => Screen::BootstrapFailed {
                message: self.cycle.bootstrap_error.clone().unwrap_or_default(),
                help_url: self.options.bootstrap_help_url.clone(),
            },
        }
    }

    /// Replaces the selection wholesale.
    pub fn select_files(&mut self, files: Vec<LocalFile>) -> Result<Step, RepodropError> {
        self.require(&[Stage::Idle], "selecting files")?;
        self.cycle.files = files;
        Ok(self.step())
    }

    pub fn start(&mut self, sink: &dyn ProgressSink) -> Result<Step, RepodropError> {
        self.require(&[Stage::Idle], "starting an upload")?;
        if self.cycle.files.is_empty() {
            return Err(RepodropError::NoFilesSelected);
        }
        if !self.session.is_authenticated() {
            return Ok(self.expired());
        }

        sink.event(phase("phase=Repositories; loading repositories"));
        self.cycle.repositories.clear();
        self.cycle.repositories_error = None;
        self.stage = Stage::SelectingRepo;
        match self.api.list_repositories() {
            Ok(repositories) => self.cycle.repositories = repositories,
            Err(err) if err.is_auth_expired() => return Ok(self.expired()),
            Err(err) => {
                tracing::warn!("repository listing failed: {err}");
                self.cycle.repositories_error = Some(REPOSITORIES_FAILED.to_string());
            }
        }
        Ok(self.step())
    }

    /// Always re-probes the root, even when the same repository is picked
    /// again within a cycle.
    pub fn pick_repository(
        &mut self,
        repository: RepositoryName,
        sink: &dyn ProgressSink,
    ) -> Result<Step, RepodropError> {
        self.require(&[Stage::SelectingRepo], "picking a repository")?;
        self.stage = Stage::CheckingEmptiness;
        self.cycle.repository_empty = None;
        self.cycle.browser = None;
        self.cycle.view = None;
        self.cycle.target = None;

        sink.event(phase(format!("phase=Probe; checking {repository}")));
        let empty = match self.api.list_contents(&repository, "") {
            Ok(_) => false,
            Err(err) if err.is_auth_expired() => return Ok(self.expired()),
            Err(err) if err.is_not_found() => true,
            Err(err) => {
                tracing::warn!(repo = %repository, "emptiness probe failed: {err}");
                return Ok(self.abort_with(Toast::error(format!("Error: {}", err.user_message()))));
            }
        };
        tracing::info!(repo = %repository, empty, "repository probed");
        self.cycle.repository_empty = Some(empty);

        self.stage = Stage::BrowsingFolder;
        let mut browser = DirectoryBrowser::new(repository);
        let result = browser.open(&self.api, "");
        self.cycle.browser = Some(browser);
        self.browsed(result)
    }

    pub fn open_folder(&mut self, path: &str) -> Result<Step, RepodropError> {
        self.require(&[Stage::BrowsingFolder], "opening a folder")?;
        let Some(browser) = self.cycle.browser.as_mut() else {
            return Err(invalid(self.stage, "opening a folder"));
        };
        let result = browser.open(&self.api, path);
        self.browsed(result)
    }

    /// Descends into the directory called `name` in the current listing.
    pub fn enter(&mut self, name: &str) -> Result<Step, RepodropError> {
        self.require(&[Stage::BrowsingFolder], "entering a folder")?;
        let entry = self
            .cycle
            .view
            .as_ref()
            .and_then(|view| view.entries().iter().find(|entry| entry.name == name))
            .cloned()
            .ok_or_else(|| RepodropError::InvalidFolderPath(name.to_string()))?;
        let Some(browser) = self.cycle.browser.as_mut() else {
            return Err(invalid(self.stage, "entering a folder"));
        };
        let result = match browser.enter(&self.api, &entry) {
            Ok(Some(view)) => Ok(view),
            Ok(None) => Err(RepodropError::InvalidFolderPath(entry.path.clone())),
            Err(err) => Err(err),
        };
        self.browsed(result)
    }

    pub fn parent(&mut self) -> Result<Step, RepodropError> {
        self.require(&[Stage::BrowsingFolder], "leaving a folder")?;
        let Some(browser) = self.cycle.browser.as_mut() else {
            return Err(invalid(self.stage, "leaving a folder"));
        };
        let result = browser.parent(&self.api);
        self.browsed(result)
    }

    /// Commits the folder currently shown as the upload destination.
    pub fn select_folder(&mut self) -> Result<Step, RepodropError> {
        self.require(&[Stage::BrowsingFolder], "selecting a folder")?;
        let Some(browser) = self.cycle.browser.as_ref() else {
            return Err(invalid(self.stage, "selecting a folder"));
        };
        let target = TargetLocation {
            repository: browser.repository().clone(),
            folder_path: browser.select_directory(),
        };
        tracing::info!(repo = %target.repository, folder = %target.folder_path, "target selected");
        self.cycle.target = Some(target);
        self.cycle.extraction = ExtractionSelector::new(&self.cycle.files);
        self.cycle.extract.clear();
        self.stage = Stage::SelectingExtraction;
        Ok(self.step())
    }

    pub fn toggle_extraction(&mut self, name: &str) -> Result<Step, RepodropError> {
        self.require(&[Stage::SelectingExtraction], "toggling extraction")?;
        self.cycle.extraction.toggle(name);
        Ok(self.step())
    }

    /// With no archive candidates, confirming means "no extraction".
    pub fn confirm_extraction(&mut self, sink: &dyn ProgressSink) -> Result<Step, RepodropError> {
        self.require(&[Stage::SelectingExtraction], "confirming extraction")?;
        self.cycle.extract = if self.cycle.extraction.has_candidates() {
            self.cycle.extraction.confirm()?
        } else {
            self.cycle.extraction.skip()
        };
        self.after_extraction(sink)
    }

    pub fn skip_extraction(&mut self, sink: &dyn ProgressSink) -> Result<Step, RepodropError> {
        self.require(&[Stage::SelectingExtraction], "skipping extraction")?;
        self.cycle.extract = self.cycle.extraction.skip();
        self.after_extraction(sink)
    }

    pub fn accept_bootstrap(&mut self, sink: &dyn ProgressSink) -> Result<Step, RepodropError> {
        self.require(&[Stage::CachePrompt], "creating the cache file")?;
        let Some(repository) = self.cycle.target.as_ref().map(|t| t.repository.clone()) else {
            return Err(invalid(self.stage, "creating the cache file"));
        };

        sink.event(phase("phase=Bootstrap; creating cache file"));
        match self.backend.create_cache(&repository) {
            Ok(_) => {
                tracing::info!(repo = %repository, "cache file created");
                self.upload(sink, vec![Toast::success(CACHE_CREATED)])
            }
            Err(err) if err.is_auth_expired() => Ok(self.expired()),
            Err(err) => {
                tracing::warn!(repo = %repository, "cache bootstrap failed: {err}");
                self.cycle.bootstrap_error = Some(err.user_message());
                self.stage = Stage::BootstrapFailed;
                Ok(self.step())
            }
        }
    }

    pub fn decline_bootstrap(&mut self, sink: &dyn ProgressSink) -> Result<Step, RepodropError> {
        self.require(&[Stage::CachePrompt], "skipping the cache file")?;
        self.upload(sink, Vec::new())
    }

    /// Closes whatever modal stage is active. Requests already issued are
    /// not undone.
    pub fn dismiss(&mut self) -> Result<Step, RepodropError> {
        self.require(
            &[
                Stage::Idle,
                Stage::SelectingRepo,
                Stage::BrowsingFolder,
                Stage::SelectingExtraction,
                Stage::CachePrompt,
                Stage::BootstrapFailed,
            ],
            "dismissing",
        )?;
        self.cycle.abort();
        self.stage = Stage::Idle;
        Ok(self.step())
    }

    pub fn logout(&mut self) -> Step {
        self.session.clear();
        self.cycle = UploadCycle::default();
        self.stage = Stage::Idle;
        Step::new(self.stage, Screen::Login)
    }

    fn after_extraction(&mut self, sink: &dyn ProgressSink) -> Result<Step, RepodropError> {
        if self.cycle.repository_empty == Some(true) {
            self.stage = Stage::CachePrompt;
            return Ok(self.step());
        }
        self.upload(sink, Vec::new())
    }

    /// Leaves `Uploading` only once the request has settled and the minimum
    /// display time has passed. Success and failure both end the cycle.
    fn upload(
        &mut self,
        sink: &dyn ProgressSink,
        mut toasts: Vec<Toast>,
    ) -> Result<Step, RepodropError> {
        let Some(target) = self.cycle.target.clone() else {
            return Err(invalid(self.stage, "uploading"));
        };
        self.stage = Stage::Uploading;
        let request = UploadRequest {
            files: self.cycle.files.clone(),
            target,
            extract: self.cycle.extract.clone(),
        };

        sink.event(phase(format!(
            "phase=Upload; {}",
            uploading_status(request.files.len())
        )));
        let started = Instant::now();
        let backend = &self.backend;
        let result = with_minimum_duration(self.options.min_upload_display, || {
            backend.upload(&request)
        });
        let elapsed = started.elapsed();
        sink.event(ProgressEvent {
            message: format!("backend.response latency_ms={}", elapsed.as_millis()),
            elapsed: Some(elapsed),
        });

        let outcome = match result {
            Ok(_) => {
                toasts.push(Toast::success(UPLOAD_SUCCEEDED));
                UploadOutcome::Done
            }
            Err(err) if err.is_auth_expired() => return Ok(self.expired()),
            Err(err) => {
                let message = err.user_message();
                toasts.push(Toast::error(format!("Error: {message}")));
                UploadOutcome::Failed(message)
            }
        };
        tracing::info!(?outcome, "upload finished");

        self.cycle = UploadCycle::default();
        self.stage = Stage::Idle;
        let mut step = self.step();
        step.toasts = toasts;
        step.outcome = Some(outcome);
        Ok(step)
    }

    fn browsed(&mut self, result: Result<BrowserView, RepodropError>) -> Result<Step, RepodropError> {
        match result {
            Ok(view) => {
                self.cycle.view = Some(view);
                Ok(self.step())
            }
            Err(err) if err.is_auth_expired() => Ok(self.expired()),
            Err(err) => Err(err),
        }
    }

    fn expired(&mut self) -> Step {
        tracing::info!("session expired, returning to login");
        self.logout()
    }

    fn abort_with(&mut self, toast: Toast) -> Step {
        self.cycle.abort();
        self.stage = Stage::Idle;
        self.step().with_toast(toast)
    }

    fn step(&self) -> Step {
        Step::new(self.stage, self.screen())
    }

    fn require(&self, allowed: &[Stage], action: &str) -> Result<(), RepodropError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(invalid(self.stage, action))
        }
    }
}

fn invalid(stage: Stage, action: &str) -> RepodropError {
    RepodropError::InvalidTransition {
        stage: stage.to_string(),
        action: action.to_string(),
    }
}

fn uploading_status(count: usize) -> String {
    format!("Uploading {count} file(s)...")
}

pub fn extraction_view(selector: &ExtractionSelector) -> ExtractionView {
    ExtractionView {
        items: selector
            .candidates()
            .iter()
            .map(|name| ExtractionItem {
                name: name.clone(),
                selected: selector.is_selected(name),
            })
            .collect(),
        can_confirm: selector.can_confirm(),
    }
}
