use serde::Serialize;

use crate::auth::{authorize_url, token_from_redirect};
use crate::backend::UploadBackend;
use crate::browser::{BrowserView, DirectoryBrowser};
use crate::config::ResolvedConfig;
use crate::domain::{Repository, RepositoryName, User};
use crate::error::RepodropError;
use crate::github::HostingApi;
use crate::session::Session;
use crate::view::Screen;
use crate::workflow::{Step, Workflow, WorkflowOptions};

/// Where the user lands after start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "user", rename_all = "snake_case")]
pub enum Landing {
    Login,
    Dashboard(User),
}

pub struct App<H: HostingApi, B: UploadBackend> {
    config: ResolvedConfig,
    workflow: Workflow<H, B>,
    user: Option<User>,
}

impl<H: HostingApi, B: UploadBackend> App<H, B> {
    pub fn new(config: ResolvedConfig, session: Session, api: H, backend: B) -> Self {
        let options = WorkflowOptions::from(&config);
        Self {
            config,
            workflow: Workflow::new(api, backend, session, options),
            user: None,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        self.workflow.session()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn workflow(&self) -> &Workflow<H, B> {
        &self.workflow
    }

    pub fn workflow_mut(&mut self) -> &mut Workflow<H, B> {
        &mut self.workflow
    }

    pub fn login_url(&self) -> Result<String, RepodropError> {
        authorize_url(&self.config.oauth)
    }

    /// Start-up: a token delivered by the authentication redirect wins over
    /// a stored one. The identity call doubles as token validation; any
    /// failure there logs the user out.
    pub fn initialize(&mut self, redirect: Option<&str>) -> Result<Landing, RepodropError> {
        if let Some(redirect) = redirect {
            if let Some(parsed) = token_from_redirect(redirect)? {
                self.session().set(&parsed.token)?;
                tracing::debug!(url = %parsed.cleaned_url, "token consumed from redirect");
            }
        }

        if !self.session().is_authenticated() {
            return Ok(Landing::Login);
        }

        match self.workflow.api().current_user() {
            Ok(user) => {
                tracing::info!(login = %user.login, "authenticated");
                self.user = Some(user.clone());
                Ok(Landing::Dashboard(user))
            }
            Err(err) => {
                tracing::warn!("identity check failed: {err}");
                self.logout();
                Ok(Landing::Login)
            }
        }
    }

    pub fn login_with_token(&mut self, token: &str) -> Result<Landing, RepodropError> {
        self.session().set(token)?;
        self.initialize(None)
    }

    pub fn logout(&mut self) -> Step {
        self.user = None;
        self.workflow.logout()
    }

    pub fn current_user(&mut self) -> Result<User, RepodropError> {
        let user = self.authenticated(|api| api.current_user())?;
        self.user = Some(user.clone());
        Ok(user)
    }

    pub fn list_repositories(&mut self) -> Result<Vec<Repository>, RepodropError> {
        self.authenticated(|api| api.list_repositories())
    }

    /// One-off directory listing outside an upload cycle.
    pub fn browse(
        &mut self,
        repository: RepositoryName,
        path: &str,
    ) -> Result<BrowserView, RepodropError> {
        let mut browser = DirectoryBrowser::new(repository);
        self.authenticated(|api| browser.open(api, path))
    }

    pub fn screen(&self) -> Screen {
        self.workflow.screen()
    }

    fn authenticated<T>(
        &mut self,
        call: impl FnOnce(&H) -> Result<T, RepodropError>,
    ) -> Result<T, RepodropError> {
        self.session().require()?;
        let result = call(self.workflow.api());
        if matches!(&result, Err(err) if err.is_auth_expired()) {
            self.logout();
        }
        result
    }
}
