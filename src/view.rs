//! Screen and notification descriptions produced by workflow transitions.
//! Renderers project these; they never drive the workflow themselves.

use serde::Serialize;

use crate::browser::BrowserView;
use crate::domain::{LocalFile, Repository, RepositoryName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == ToastLevel::Error
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoPicker {
    pub repositories: Vec<Repository>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionItem {
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionView {
    pub items: Vec<ExtractionItem>,
    pub can_confirm: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Login,
    Dashboard {
        files: Vec<LocalFile>,
    },
    RepoPicker(RepoPicker),
    Browser(BrowserView),
    Extraction(ExtractionView),
    CachePrompt {
        repository: RepositoryName,
    },
    Uploading {
        status: String,
    },
    BootstrapFailed {
        message: String,
        help_url: String,
    },
}

impl Screen {
    pub fn is_login(&self) -> bool {
        matches!(self, Screen::Login)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Login => "Sign in",
            Screen::Dashboard { .. } => "Dashboard",
            Screen::RepoPicker(_) => "Choose destination repository",
            Screen::Browser(_) => "Choose destination folder",
            Screen::Extraction(_) => "Enable auto-extract?",
            Screen::CachePrompt { .. } => "New repository detected",
            Screen::Uploading { .. } => "Uploading",
            Screen::BootstrapFailed { .. } => "Cache bootstrap failed",
        }
    }
}
