use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use repodrop::backend::{BackendReply, UploadBackend, UploadRequest};
use repodrop::browser::Listing;
use repodrop::config::{Config, ConfigLoader, EnvOverrides};
use repodrop::domain::{EntryKind, LocalFile, RemoteEntry, Repository, RepositoryName, User};
use repodrop::error::RepodropError;
use repodrop::github::HostingApi;
use repodrop::session::Session;
use repodrop::tui::select_from_input;
use repodrop::view::{Screen, Toast};
use repodrop::workflow::{
    CACHE_CREATED, NoProgress, REPOSITORIES_FAILED, Stage, UPLOAD_SUCCEEDED, UploadOutcome,
    Workflow, WorkflowOptions,
};

const HELP_URL: &str = "http://localhost:3000/tutorial.html";

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Call {
    User,
    Repositories,
    Contents,
    Cache,
    Upload,
}

/// Fake hosting service keyed by `(repo, path)`. Missing keys answer 404.
#[derive(Default)]
struct MockHosting {
    session: Option<Session>,
    repositories: Vec<Repository>,
    trees: HashMap<(String, String), Vec<RemoteEntry>>,
    unauthorized: Arc<Mutex<HashSet<Call>>>,
    failing: HashSet<Call>,
    failing_paths: HashSet<String>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockHosting {
    fn with_tree(mut self, repo: &str, path: &str, entries: Vec<RemoteEntry>) -> Self {
        self.trees
            .insert((repo.to_string(), path.to_string()), entries);
        self
    }

    fn reject(&self, call: Call) -> Option<RepodropError> {
        if self.unauthorized.lock().unwrap().contains(&call) {
            if let Some(session) = &self.session {
                session.clear();
            }
            return Some(RepodropError::AuthExpired);
        }
        if self.failing.contains(&call) {
            return Some(RepodropError::RemoteStatus {
                status: 500,
                message: "Server exploded".to_string(),
            });
        }
        None
    }
}

impl HostingApi for MockHosting {
    fn current_user(&self) -> Result<User, RepodropError> {
        if let Some(err) = self.reject(Call::User) {
            return Err(err);
        }
        Ok(User {
            login: "alice".to_string(),
            avatar_url: None,
        })
    }

    fn list_repositories(&self) -> Result<Vec<Repository>, RepodropError> {
        if let Some(err) = self.reject(Call::Repositories) {
            return Err(err);
        }
        Ok(self.repositories.clone())
    }

    fn list_contents(
        &self,
        repo: &RepositoryName,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, RepodropError> {
        self.calls
            .lock()
            .unwrap()
            .push((repo.to_string(), path.to_string()));
        if let Some(err) = self.reject(Call::Contents) {
            return Err(err);
        }
        if self.failing_paths.contains(path) {
            return Err(RepodropError::RemoteStatus {
                status: 500,
                message: "boom".to_string(),
            });
        }
        self.trees
            .get(&(repo.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| RepodropError::NotFound {
                message: "Not Found".to_string(),
            })
    }
}

#[derive(Default)]
struct BackendLog {
    caches: Vec<String>,
    uploads: Vec<UploadRequest>,
}

#[derive(Default)]
struct MockBackend {
    session: Option<Session>,
    unauthorized: HashSet<Call>,
    failing: HashSet<Call>,
    log: Arc<Mutex<BackendLog>>,
}

impl MockBackend {
    fn reject(&self, call: Call, message: &str) -> Option<RepodropError> {
        if self.unauthorized.contains(&call) {
            if let Some(session) = &self.session {
                session.clear();
            }
            return Some(RepodropError::AuthExpired);
        }
        if self.failing.contains(&call) {
            return Some(RepodropError::BackendStatus {
                status: 500,
                message: message.to_string(),
            });
        }
        None
    }
}

impl UploadBackend for MockBackend {
    fn create_cache(&self, repo: &RepositoryName) -> Result<BackendReply, RepodropError> {
        self.log.lock().unwrap().caches.push(repo.to_string());
        if let Some(err) = self.reject(Call::Cache, "Repository is archived") {
            return Err(err);
        }
        Ok(BackendReply {
            success: Some(true),
            message: None,
        })
    }

    fn upload(&self, request: &UploadRequest) -> Result<BackendReply, RepodropError> {
        self.log.lock().unwrap().uploads.push(request.clone());
        if let Some(err) = self.reject(Call::Upload, "Disk full") {
            return Err(err);
        }
        Ok(BackendReply {
            success: Some(true),
            message: Some("ok".to_string()),
        })
    }
}

fn dir(parent: &str, name: &str) -> RemoteEntry {
    entry(parent, name, EntryKind::Dir)
}

fn file(parent: &str, name: &str) -> RemoteEntry {
    entry(parent, name, EntryKind::File)
}

fn entry(parent: &str, name: &str, kind: EntryKind) -> RemoteEntry {
    let path = if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    };
    RemoteEntry {
        name: name.to_string(),
        path,
        kind,
    }
}

fn local(name: &str, size: u64) -> LocalFile {
    LocalFile {
        name: name.to_string(),
        size,
        path: Utf8PathBuf::from(format!("/tmp/{name}")),
    }
}

fn repository(full_name: &str) -> Repository {
    Repository {
        full_name: full_name.to_string(),
        private: false,
        pushed_at: None,
    }
}

fn repo(name: &str) -> RepositoryName {
    name.parse().unwrap()
}

fn signed_in() -> Session {
    let session = Session::in_memory();
    session.set("gho_test").unwrap();
    session
}

fn fast() -> WorkflowOptions {
    WorkflowOptions {
        min_upload_display: Duration::ZERO,
        bootstrap_help_url: HELP_URL.to_string(),
    }
}

fn hosting(session: &Session) -> MockHosting {
    MockHosting {
        session: Some(session.clone()),
        repositories: vec![repository("alice/site"), repository("alice/empty")],
        ..MockHosting::default()
    }
    .with_tree(
        "alice/site",
        "",
        vec![file("", "README.md"), dir("", "docs"), dir("", "assets")],
    )
    .with_tree("alice/site", "docs", vec![file("docs", "index.md")])
}

fn backend(session: &Session) -> MockBackend {
    MockBackend {
        session: Some(session.clone()),
        ..MockBackend::default()
    }
}

fn workflow_at_extraction(
    workflow: &mut Workflow<MockHosting, MockBackend>,
    repository: &str,
    folder: &str,
) {
    workflow
        .select_files(vec![local("notes.txt", 2048), local("report.zip", 4096)])
        .unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow.pick_repository(repo(repository), &NoProgress).unwrap();
    if !folder.is_empty() {
        workflow.open_folder(folder).unwrap();
    }
    let step = workflow.select_folder().unwrap();
    assert_eq!(step.stage, Stage::SelectingExtraction);
}

#[test]
fn upload_to_populated_repository_with_extraction() {
    let session = signed_in();
    let backend = backend(&session);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    workflow
        .select_files(vec![local("notes.txt", 2048), local("report.zip", 4096)])
        .unwrap();
    let step = workflow.start(&NoProgress).unwrap();
    assert_matches!(&step.screen, Screen::RepoPicker(picker) if picker.repositories.len() == 2);

    let step = workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();
    assert_eq!(workflow.cycle().repository_empty(), Some(false));
    let Screen::Browser(view) = &step.screen else {
        panic!("expected browser, got {:?}", step.screen);
    };
    let names: Vec<_> = view.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["assets", "docs", "README.md"]);

    let step = workflow.enter("docs").unwrap();
    assert_matches!(&step.screen, Screen::Browser(view) if view.path == "docs");

    let step = workflow.select_folder().unwrap();
    let Screen::Extraction(view) = &step.screen else {
        panic!("expected extraction, got {:?}", step.screen);
    };
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].name, "report.zip");
    assert!(!view.can_confirm);

    workflow.toggle_extraction("report.zip").unwrap();
    let step = workflow.confirm_extraction(&NoProgress).unwrap();

    assert_eq!(step.stage, Stage::Idle);
    assert_eq!(step.outcome, Some(UploadOutcome::Done));
    assert_eq!(step.toasts, vec![Toast::success(UPLOAD_SUCCEEDED)]);

    let log = log.lock().unwrap();
    assert!(log.caches.is_empty());
    assert_eq!(log.uploads.len(), 1);
    let request = &log.uploads[0];
    assert_eq!(request.target.repository, repo("alice/site"));
    assert_eq!(request.target.folder_path, "docs");
    assert_eq!(request.extract, vec!["report.zip".to_string()]);
    let files: Vec<_> = request.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(files, vec!["notes.txt", "report.zip"]);
}

#[test]
fn upload_stays_visible_for_configured_minimum() {
    let config = ConfigLoader::resolve_config(Config::default(), &EnvOverrides::default()).unwrap();
    assert_eq!(config.min_upload_display, Duration::from_millis(3000));

    let session = signed_in();
    let mut workflow = Workflow::new(
        hosting(&session),
        backend(&session),
        session,
        WorkflowOptions::from(&config),
    );
    workflow_at_extraction(&mut workflow, "alice/site", "");

    let started = Instant::now();
    let step = workflow.skip_extraction(&NoProgress).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(step.outcome, Some(UploadOutcome::Done));
}

#[test]
fn empty_repository_prompts_and_bootstraps_before_upload() {
    let session = signed_in();
    let backend = backend(&session);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    workflow
        .select_files(vec![local("index.html", 512)])
        .unwrap();
    workflow.start(&NoProgress).unwrap();
    let step = workflow
        .pick_repository(repo("alice/empty"), &NoProgress)
        .unwrap();
    assert_eq!(workflow.cycle().repository_empty(), Some(true));
    assert_matches!(&step.screen, Screen::Browser(view) if view.listing == Listing::Empty);

    workflow.select_folder().unwrap();
    let step = workflow.skip_extraction(&NoProgress).unwrap();
    assert_eq!(step.stage, Stage::CachePrompt);
    assert_matches!(&step.screen, Screen::CachePrompt { repository } if *repository == repo("alice/empty"));
    assert!(log.lock().unwrap().uploads.is_empty());

    let step = workflow.accept_bootstrap(&NoProgress).unwrap();
    assert_eq!(
        step.toasts,
        vec![Toast::success(CACHE_CREATED), Toast::success(UPLOAD_SUCCEEDED)]
    );
    assert_eq!(step.outcome, Some(UploadOutcome::Done));

    let log = log.lock().unwrap();
    assert_eq!(log.caches, vec!["alice/empty".to_string()]);
    assert_eq!(log.uploads.len(), 1);
    assert_eq!(log.uploads[0].target.folder_path, "");
}

#[test]
fn declining_bootstrap_uploads_without_cache() {
    let session = signed_in();
    let backend = backend(&session);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    workflow_at_extraction(&mut workflow, "alice/empty", "");
    workflow.skip_extraction(&NoProgress).unwrap();
    let step = workflow.decline_bootstrap(&NoProgress).unwrap();

    assert_eq!(step.outcome, Some(UploadOutcome::Done));
    let log = log.lock().unwrap();
    assert!(log.caches.is_empty());
    assert_eq!(log.uploads.len(), 1);
}

#[test]
fn failed_bootstrap_shows_help_and_keeps_files_on_dismiss() {
    let session = signed_in();
    let mut backend = backend(&session);
    backend.failing.insert(Call::Cache);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    workflow_at_extraction(&mut workflow, "alice/empty", "");
    workflow.skip_extraction(&NoProgress).unwrap();
    let step = workflow.accept_bootstrap(&NoProgress).unwrap();

    assert_eq!(step.stage, Stage::BootstrapFailed);
    assert_matches!(
        &step.screen,
        Screen::BootstrapFailed { message, help_url }
            if message == "Repository is archived" && help_url == HELP_URL
    );
    assert!(log.lock().unwrap().uploads.is_empty());

    let step = workflow.dismiss().unwrap();
    assert_eq!(step.stage, Stage::Idle);
    assert_eq!(workflow.cycle().files().len(), 2);
}

#[test]
fn missing_folder_is_empty_and_still_selectable() {
    let session = signed_in();
    let api = hosting(&session).with_tree("alice/site", "src", vec![file("src", "main.rs")]);
    let backend = backend(&session);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(api, backend, session, fast());

    workflow.select_files(vec![local("lib.rs", 100)]).unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();
    let step = workflow.open_folder("src/lib").unwrap();
    let Screen::Browser(view) = &step.screen else {
        panic!("expected browser, got {:?}", step.screen);
    };
    assert_eq!(view.listing, Listing::Empty);
    let labels: Vec<_> = view.breadcrumbs.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["root", "src", "lib"]);

    let step = workflow.select_folder().unwrap();
    assert_matches!(&step.screen, Screen::Extraction(view) if view.items.is_empty());
    assert_eq!(
        workflow.cycle().target().map(|t| t.folder_path.as_str()),
        Some("src/lib")
    );

    workflow.skip_extraction(&NoProgress).unwrap();
    assert_eq!(log.lock().unwrap().uploads[0].target.folder_path, "src/lib");
}

#[test]
fn repository_is_probed_again_on_every_pick() {
    let session = signed_in();
    let api = hosting(&session);
    let calls = api.calls.clone();
    let mut workflow = Workflow::new(api, backend(&session), session, fast());

    workflow.select_files(vec![local("a.txt", 1)]).unwrap();
    for _ in 0..2 {
        workflow.start(&NoProgress).unwrap();
        workflow
            .pick_repository(repo("alice/site"), &NoProgress)
            .unwrap();
        workflow.dismiss().unwrap();
    }

    let root_probes = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|(repo, path)| repo == "alice/site" && path.is_empty())
        .count();
    // Probe plus root listing, per pick.
    assert_eq!(root_probes, 4);
}

#[test]
fn repository_listing_failure_is_shown_in_picker() {
    let session = signed_in();
    let mut api = hosting(&session);
    api.failing.insert(Call::Repositories);
    let mut workflow = Workflow::new(api, backend(&session), session, fast());

    workflow.select_files(vec![local("a.txt", 1)]).unwrap();
    let step = workflow.start(&NoProgress).unwrap();
    assert_eq!(step.stage, Stage::SelectingRepo);
    assert_matches!(
        &step.screen,
        Screen::RepoPicker(picker)
            if picker.repositories.is_empty()
                && picker.error.as_deref() == Some(REPOSITORIES_FAILED)
    );
}

#[test]
fn probe_failure_aborts_with_error_toast() {
    let session = signed_in();
    let mut api = hosting(&session);
    api.failing.insert(Call::Contents);
    let mut workflow = Workflow::new(api, backend(&session), session, fast());

    workflow.select_files(vec![local("a.txt", 1)]).unwrap();
    workflow.start(&NoProgress).unwrap();
    let step = workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();

    assert_eq!(step.stage, Stage::Idle);
    assert_eq!(step.toasts, vec![Toast::error("Error: Server exploded")]);
    assert_matches!(&step.screen, Screen::Dashboard { files } if files.len() == 1);
}

#[test]
fn backend_failure_ends_cycle_with_error() {
    let session = signed_in();
    let mut backend = backend(&session);
    backend.failing.insert(Call::Upload);
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    workflow_at_extraction(&mut workflow, "alice/site", "docs");
    let step = workflow.skip_extraction(&NoProgress).unwrap();

    assert_eq!(step.stage, Stage::Idle);
    assert_eq!(
        step.outcome,
        Some(UploadOutcome::Failed("Disk full".to_string()))
    );
    assert_eq!(step.toasts, vec![Toast::error("Error: Disk full")]);
    assert!(workflow.cycle().target().is_none());
}

#[derive(Debug, Clone, Copy)]
enum Expiry {
    Repositories,
    Probe,
    Upload,
    Cache,
}

fn drive_until_expiry(workflow: &mut Workflow<MockHosting, MockBackend>, expiry: Expiry) {
    match expiry {
        Expiry::Repositories => {
            workflow.start(&NoProgress).unwrap();
        }
        Expiry::Probe => {
            workflow.start(&NoProgress).unwrap();
            workflow
                .pick_repository(repo("alice/site"), &NoProgress)
                .unwrap();
        }
        Expiry::Upload => {
            workflow_at_extraction(workflow, "alice/site", "");
            workflow.skip_extraction(&NoProgress).unwrap();
        }
        Expiry::Cache => {
            workflow_at_extraction(workflow, "alice/empty", "");
            workflow.skip_extraction(&NoProgress).unwrap();
            workflow.accept_bootstrap(&NoProgress).unwrap();
        }
    }
}

#[test]
fn expired_session_returns_to_login_from_every_call() {
    for expiry in [Expiry::Repositories, Expiry::Probe, Expiry::Upload, Expiry::Cache] {
        let session = signed_in();
        let api = hosting(&session);
        let mut backend = backend(&session);
        match expiry {
            Expiry::Repositories => {
                api.unauthorized.lock().unwrap().insert(Call::Repositories);
            }
            Expiry::Probe => {
                api.unauthorized.lock().unwrap().insert(Call::Contents);
            }
            Expiry::Upload => {
                backend.unauthorized.insert(Call::Upload);
            }
            Expiry::Cache => {
                backend.unauthorized.insert(Call::Cache);
            }
        }
        let mut workflow = Workflow::new(api, backend, session.clone(), fast());
        workflow
            .select_files(vec![local("notes.txt", 1), local("report.zip", 1)])
            .unwrap();
        drive_until_expiry(&mut workflow, expiry);

        assert!(!session.is_authenticated(), "{expiry:?}: token kept");
        assert_eq!(workflow.stage(), Stage::Idle, "{expiry:?}");
        assert_eq!(workflow.screen(), Screen::Login, "{expiry:?}");
        assert!(workflow.cycle().files().is_empty(), "{expiry:?}");
    }
}

#[test]
fn expired_session_while_browsing_returns_to_login() {
    let session = signed_in();
    let api = hosting(&session);
    let unauthorized = api.unauthorized.clone();
    let mut workflow = Workflow::new(api, backend(&session), session.clone(), fast());
    workflow.select_files(vec![local("a.txt", 1)]).unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();

    unauthorized.lock().unwrap().insert(Call::Contents);
    let step = workflow.enter("docs").unwrap();
    assert_eq!(step.stage, Stage::Idle);
    assert_eq!(step.screen, Screen::Login);
    assert!(!session.is_authenticated());
}

#[test]
fn start_without_session_shows_login() {
    let session = Session::in_memory();
    let mut workflow = Workflow::new(hosting(&session), backend(&session), session, fast());
    workflow.select_files(vec![local("a.txt", 1)]).unwrap();

    let step = workflow.start(&NoProgress).unwrap();
    assert_eq!(step.screen, Screen::Login);
}

#[test]
fn start_requires_files() {
    let session = signed_in();
    let mut workflow = Workflow::new(hosting(&session), backend(&session), session, fast());
    assert_matches!(
        workflow.start(&NoProgress),
        Err(RepodropError::NoFilesSelected)
    );
}

#[test]
fn out_of_order_calls_are_rejected() {
    let session = signed_in();
    let mut workflow = Workflow::new(hosting(&session), backend(&session), session, fast());
    workflow.select_files(vec![local("a.zip", 1)]).unwrap();

    assert_matches!(
        workflow.confirm_extraction(&NoProgress),
        Err(RepodropError::InvalidTransition { .. })
    );
    assert_matches!(
        workflow.pick_repository(repo("alice/site"), &NoProgress),
        Err(RepodropError::InvalidTransition { .. })
    );
    assert_eq!(workflow.stage(), Stage::Idle);
}

#[test]
fn confirm_without_selection_keeps_stage() {
    let session = signed_in();
    let mut workflow = Workflow::new(hosting(&session), backend(&session), session, fast());
    workflow_at_extraction(&mut workflow, "alice/site", "");

    assert_matches!(
        workflow.confirm_extraction(&NoProgress),
        Err(RepodropError::NothingToExtract)
    );
    assert_eq!(workflow.stage(), Stage::SelectingExtraction);

    workflow.toggle_extraction("report.zip").unwrap();
    workflow.toggle_extraction("report.zip").unwrap();
    workflow.toggle_extraction("notes.txt").unwrap();
    assert!(workflow.cycle().extraction().selected().is_empty());
}

#[test]
fn confirming_without_archives_uploads_without_extraction() {
    let session = signed_in();
    let backend = backend(&session);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    workflow.select_files(vec![local("notes.txt", 1)]).unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();
    let step = workflow.select_folder().unwrap();
    assert_matches!(&step.screen, Screen::Extraction(view) if view.items.is_empty());

    let step = workflow.confirm_extraction(&NoProgress).unwrap();
    assert_eq!(step.outcome, Some(UploadOutcome::Done));
    assert!(log.lock().unwrap().uploads[0].extract.is_empty());
}

#[test]
fn folder_load_failure_keeps_browser_open() {
    let session = signed_in();
    let mut api = hosting(&session).with_tree("alice/site", "assets", Vec::new());
    api.failing_paths.insert("assets".to_string());
    let mut workflow = Workflow::new(api, backend(&session), session, fast());

    workflow.select_files(vec![local("a.txt", 1)]).unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();
    let step = workflow.enter("assets").unwrap();

    assert_eq!(step.stage, Stage::BrowsingFolder);
    assert!(step.toasts.is_empty());
    assert_matches!(
        &step.screen,
        Screen::Browser(view)
            if view.path == "assets" && view.listing == Listing::Failed("boom".to_string())
    );

    let step = workflow.select_folder().unwrap();
    assert_eq!(step.stage, Stage::SelectingExtraction);
    assert_eq!(
        workflow.cycle().target().map(|t| t.folder_path.as_str()),
        Some("assets")
    );
}

#[test]
fn entering_a_file_is_rejected() {
    let session = signed_in();
    let api = hosting(&session);
    let calls = api.calls.clone();
    let mut workflow = Workflow::new(api, backend(&session), session, fast());

    workflow.select_files(vec![local("a.txt", 1)]).unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();
    let before = calls.lock().unwrap().len();

    assert_matches!(
        workflow.enter("README.md"),
        Err(RepodropError::InvalidFolderPath(path)) if path == "README.md"
    );
    assert_matches!(
        workflow.enter("missing"),
        Err(RepodropError::InvalidFolderPath(_))
    );
    assert_eq!(calls.lock().unwrap().len(), before);
    assert_eq!(workflow.stage(), Stage::BrowsingFolder);
}

#[test]
fn files_can_be_chosen_again_after_a_finished_cycle() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    std::fs::write(root.join("first.txt").as_std_path(), b"one").unwrap();
    std::fs::write(root.join("second report.zip").as_std_path(), b"two!").unwrap();

    let session = signed_in();
    let backend = backend(&session);
    let log = backend.log.clone();
    let mut workflow = Workflow::new(hosting(&session), backend, session, fast());

    select_from_input(&mut workflow, root.join("first.txt").as_str()).unwrap();
    workflow.start(&NoProgress).unwrap();
    workflow
        .pick_repository(repo("alice/site"), &NoProgress)
        .unwrap();
    workflow.select_folder().unwrap();
    let step = workflow.skip_extraction(&NoProgress).unwrap();
    assert_matches!(&step.screen, Screen::Dashboard { files } if files.is_empty());

    let typed = format!("\"{}\"", root.join("second report.zip"));
    let step = select_from_input(&mut workflow, &typed).unwrap();
    assert_matches!(
        &step.screen,
        Screen::Dashboard { files } if files.len() == 1 && files[0].name == "second report.zip"
    );
    let step = workflow.start(&NoProgress).unwrap();
    assert_eq!(step.stage, Stage::SelectingRepo);
    assert_eq!(log.lock().unwrap().uploads.len(), 1);
}

#[test]
fn unreadable_paths_leave_selection_unchanged() {
    let session = signed_in();
    let mut workflow = Workflow::new(hosting(&session), backend(&session), session, fast());
    workflow.select_files(vec![local("kept.txt", 1)]).unwrap();

    assert_matches!(
        select_from_input(&mut workflow, "/definitely/not/here.txt"),
        Err(RepodropError::Filesystem(_))
    );
    assert_matches!(
        select_from_input(&mut workflow, ""),
        Err(RepodropError::NoFilesSelected)
    );
    assert_eq!(workflow.cycle().files()[0].name, "kept.txt");
}
