use crate::domain::LocalFile;
use crate::error::RepodropError;

pub const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".7z"];

/// Suffix match only; archive contents are validated server-side.
pub fn is_archive(name: &str) -> bool {
    let lowered = name.to_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}

pub fn archives(files: &[LocalFile]) -> Vec<&LocalFile> {
    files.iter().filter(|file| is_archive(&file.name)).collect()
}

/// Splits requested names into archives present in `files` and everything
/// else. Duplicates collapse.
pub fn partition_requested(files: &[LocalFile], requested: &[String]) -> (Vec<String>, Vec<String>) {
    let present = archives(files);
    let mut accepted = Vec::new();
    let mut ignored = Vec::new();
    for name in requested {
        let bucket = if present.iter().any(|file| &file.name == name) {
            &mut accepted
        } else {
            &mut ignored
        };
        if !bucket.contains(name) {
            bucket.push(name.clone());
        }
    }
    (accepted, ignored)
}

/// Which archive files should be unpacked by the server after upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSelector {
    candidates: Vec<String>,
    selected: Vec<String>,
}

impl ExtractionSelector {
    pub fn new(files: &[LocalFile]) -> Self {
        let mut candidates = Vec::new();
        for file in archives(files) {
            if !candidates.contains(&file.name) {
                candidates.push(file.name.clone());
            }
        }
        Self {
            candidates,
            selected: Vec::new(),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.iter().any(|selected| selected == name)
    }

    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Flips membership of `name`; returns whether it is now selected.
    /// Names that are not archive candidates are ignored.
    pub fn toggle(&mut self, name: &str) -> bool {
        if !self.candidates.iter().any(|candidate| candidate == name) {
            return false;
        }
        if let Some(index) = self.selected.iter().position(|selected| selected == name) {
            self.selected.remove(index);
            false
        } else {
            self.selected.push(name.to_string());
            true
        }
    }

    pub fn can_confirm(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn confirm(&self) -> Result<Vec<String>, RepodropError> {
        if !self.can_confirm() {
            return Err(RepodropError::NothingToExtract);
        }
        Ok(self.selected.clone())
    }

    pub fn skip(&mut self) -> Vec<String> {
        self.selected.clear();
        Vec::new()
    }
}
