use serde::{Deserialize, Serialize};

/// An OCR'd form: stable identifier, human-readable name, extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub display_name: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            text: text.into(),
        }
    }
}

/// Look up the display name for a document id, falling back to the id itself.
pub fn display_name_for<'a>(documents: &'a [Document], id: &'a str) -> &'a str {
    documents
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.display_name.as_str())
        .unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_lookup() {
        let docs = vec![Document::new("f1", "application.pdf", "Name: Alex")];
        assert_eq!(display_name_for(&docs, "f1"), "application.pdf");
        assert_eq!(display_name_for(&docs, "missing"), "missing");
    }
}
