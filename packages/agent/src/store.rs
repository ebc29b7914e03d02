//! Directory-backed store of OCR'd forms.
//!
//! Layout: one directory per form under the store root, named by its uuid,
//! holding `ocr_text.txt` plus the original upload under its own file name.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{FormAgentError, Result};

/// File name of the extracted text inside a form directory.
pub const OCR_TEXT_FILE: &str = "ocr_text.txt";

/// Read/write access to the forms directory.
#[derive(Debug, Clone)]
pub struct FormStore {
    root: PathBuf,
}

impl FormStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save an original upload and its OCR text. Returns the new form id.
    pub fn save(&self, file_name: &str, original: &[u8], ocr_text: &str) -> Result<String> {
        let file_name = sanitize_file_name(file_name)?;

        let id = uuid::Uuid::new_v4().to_string();
        let form_dir = self.root.join(&id);
        fs::create_dir_all(&form_dir)?;

        fs::write(form_dir.join(&file_name), original)?;
        fs::write(form_dir.join(OCR_TEXT_FILE), ocr_text)?;

        debug!(form_id = %id, file_name = %file_name, "saved form");
        Ok(id)
    }

    /// Original file name for a form, or the id when none is stored.
    pub fn display_name(&self, id: &str) -> String {
        let form_dir = self.root.join(id);
        let Ok(entries) = fs::read_dir(&form_dir) else {
            return id.to_string();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name != OCR_TEXT_FILE)
            .collect();
        names.sort();

        names.into_iter().next().unwrap_or_else(|| id.to_string())
    }

    /// Load every stored form, ordered by id.
    ///
    /// Directories without an `ocr_text.txt` are skipped. A missing store
    /// root yields an empty list.
    pub fn load_all(&self) -> Result<Vec<Document>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(id) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 form directory");
                continue;
            };
            let ocr_path = entry.path().join(OCR_TEXT_FILE);
            if !ocr_path.is_file() {
                continue;
            }
            let text = fs::read_to_string(&ocr_path)?;
            let display_name = self.display_name(&id);
            documents.push(Document {
                id,
                display_name,
                text,
            });
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    /// Load the forms named by `ids`, in the given order. An empty selection
    /// loads everything.
    pub fn load_selected(&self, ids: &[String]) -> Result<Vec<Document>> {
        let all = self.load_all()?;
        if ids.is_empty() {
            return Ok(all);
        }

        ids.iter()
            .map(|id| {
                all.iter()
                    .find(|d| &d.id == id)
                    .cloned()
                    .ok_or_else(|| FormAgentError::FormNotFound(id.clone()))
            })
            .collect()
    }
}

/// Reduce an upload name to a bare file name that cannot escape the form directory.
fn sanitize_file_name(file_name: &str) -> Result<String> {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_default();

    if name.is_empty() || name == OCR_TEXT_FILE {
        return Err(FormAgentError::InvalidInput(format!(
            "unusable file name: '{file_name}'"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FormStore::new(dir.path());

        let id = store
            .save("claim.pdf", b"%PDF-1.4", "Claim amount: 600000")
            .unwrap();

        let docs = store.load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert_eq!(docs[0].display_name, "claim.pdf");
        assert_eq!(docs[0].text, "Claim amount: 600000");
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FormStore::new(dir.path().join("nope"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_directory_without_text_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("orphan")).unwrap();
        fs::write(dir.path().join("orphan").join("scan.png"), b"png").unwrap();

        let store = FormStore::new(dir.path());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let dir = TempDir::new().unwrap();
        let form_dir = dir.path().join("abc");
        fs::create_dir_all(&form_dir).unwrap();
        fs::write(form_dir.join(OCR_TEXT_FILE), "text").unwrap();

        let store = FormStore::new(dir.path());
        assert_eq!(store.display_name("abc"), "abc");
        assert_eq!(store.load_all().unwrap()[0].display_name, "abc");
    }

    #[test]
    fn test_load_selected_keeps_order_and_rejects_unknown() {
        let dir = TempDir::new().unwrap();
        let store = FormStore::new(dir.path());
        let a = store.save("a.png", b"a", "A").unwrap();
        let b = store.save("b.png", b"b", "B").unwrap();

        let docs = store.load_selected(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(docs[0].id, b);
        assert_eq!(docs[1].id, a);

        assert_eq!(store.load_selected(&[]).unwrap().len(), 2);

        let err = store.load_selected(&["missing".into()]).unwrap_err();
        assert!(matches!(err, FormAgentError::FormNotFound(id) if id == "missing"));
    }

    #[test]
    fn test_save_strips_directories_from_name() {
        let dir = TempDir::new().unwrap();
        let store = FormStore::new(dir.path());
        let id = store.save("../../etc/passwd.png", b"x", "t").unwrap();
        assert_eq!(store.display_name(&id), "passwd.png");
    }

    #[test]
    fn test_save_rejects_reserved_name() {
        let dir = TempDir::new().unwrap();
        let store = FormStore::new(dir.path());
        assert!(store.save(OCR_TEXT_FILE, b"x", "t").is_err());
        assert!(store.save("", b"x", "t").is_err());
    }
}
