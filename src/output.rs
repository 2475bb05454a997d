use std::io::{self, Write};

use serde::Serialize;

use crate::browser::{BrowserView, Listing};
use crate::domain::{Repository, User};
use crate::view::{Screen, Toast, ToastLevel};
use crate::workflow::{ProgressEvent, ProgressSink, Step};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_step(step: &Step) -> io::Result<()> {
        Self::print_json(step)
    }

    pub fn print_user(user: &User) -> io::Result<()> {
        Self::print_json(user)
    }

    pub fn print_repositories(repositories: &[Repository]) -> io::Result<()> {
        Self::print_json(&repositories)
    }

    pub fn print_listing(view: &BrowserView) -> io::Result<()> {
        Self::print_json(view)
    }

    pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text progress on stderr for non-interactive runs.
pub struct TextProgress;

impl ProgressSink for TextProgress {
    fn event(&self, event: ProgressEvent) {
        let message = event.message.trim();
        if let Some((_, payload)) = message.split_once("; ") {
            eprintln!("... {payload}");
        } else {
            tracing::debug!("{message}");
        }
    }
}

pub fn render_toast(toast: &Toast) -> String {
    match toast.level {
        ToastLevel::Success => format!("\x1b[32m✔ {}\x1b[0m", toast.message),
        ToastLevel::Error => format!("\x1b[31m✘ {}\x1b[0m", toast.message),
    }
}

/// Text projection of a screen, one line per item.
pub fn render_screen(screen: &Screen) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", screen.title())];
    match screen {
        Screen::Login => lines.push("Not signed in. Run `repodrop login`.".to_string()),
        Screen::Dashboard { files } => {
            if files.is_empty() {
                lines.push("No files selected.".to_string());
            }
            for file in files {
                lines.push(format!("{} ({})", file.name, file.size_kb()));
            }
        }
        Screen::RepoPicker(picker) => {
            if let Some(error) = &picker.error {
                lines.push(error.clone());
            } else if picker.repositories.is_empty() {
                lines.push("You have no repositories.".to_string());
            }
            for repository in &picker.repositories {
                lines.push(repository.full_name.clone());
            }
        }
        Screen::Browser(view) => lines.extend(render_listing(view)),
        Screen::Extraction(view) => {
            if view.items.is_empty() {
                lines.push("No archive files (.zip, .7z) found.".to_string());
            }
            for item in &view.items {
                let mark = if item.selected { "[x]" } else { "[ ]" };
                lines.push(format!("{mark} {}", item.name));
            }
        }
        Screen::CachePrompt { repository } => lines.push(format!(
            "{repository} is empty. Create a \"cache\" file first so the upload can succeed?"
        )),
        Screen::Uploading { status } => lines.push(status.clone()),
        Screen::BootstrapFailed { message, help_url } => {
            lines.push(message.clone());
            lines.push(format!("See how to fix it: {help_url}"));
        }
    }
    lines
}

pub fn render_listing(view: &BrowserView) -> Vec<String> {
    let trail = view
        .breadcrumbs
        .iter()
        .map(|crumb| crumb.label.as_str())
        .collect::<Vec<_>>()
        .join(" / ");
    let mut lines = vec![format!("{} :: {trail}", view.repository)];
    match &view.listing {
        Listing::Entries(entries) => {
            for entry in entries {
                let suffix = if entry.is_dir() { "/" } else { "" };
                lines.push(format!("  {}{suffix}", entry.name));
            }
        }
        Listing::Empty => lines.push("  This folder is empty.".to_string()),
        Listing::Failed(_) => lines.push("  Failed to load contents.".to_string()),
    }
    lines
}
