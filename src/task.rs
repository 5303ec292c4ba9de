//! The unit of work: one submitted conversion request.

use crate::error::PdfServerError;

/// One conversion request. Immutable once created.
///
/// The id doubles as the name of the task's working directory, so it is
/// restricted to a non-negative integer: nothing path-like can sneak in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    source_url: String,
    id: String,
    callback_url: String,
}

impl Task {
    /// Validate and build a task.
    ///
    /// # Errors
    /// [`PdfServerError::InvalidTask`] when a field is empty or the id is not
    /// a number.
    pub fn new(
        source_url: impl Into<String>,
        id: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Result<Self, PdfServerError> {
        let source_url = source_url.into();
        let id = id.into();
        let callback_url = callback_url.into();

        if source_url.is_empty() {
            return Err(PdfServerError::InvalidTask("Missing param url".into()));
        }
        if id.is_empty() {
            return Err(PdfServerError::InvalidTask("Missing param id".into()));
        }
        if callback_url.is_empty() {
            return Err(PdfServerError::InvalidTask("Missing param callback".into()));
        }
        if id.parse::<u64>().is_err() {
            return Err(PdfServerError::InvalidTask("id is not a number".into()));
        }

        Ok(Self {
            source_url,
            id,
            callback_url,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_task() {
        let t = Task::new("http://a/doc.pdf", "42", "http://b/cb").unwrap();
        assert_eq!(t.id(), "42");
        assert_eq!(t.source_url(), "http://a/doc.pdf");
        assert_eq!(t.callback_url(), "http://b/cb");
    }

    #[test]
    fn missing_fields() {
        for (url, id, cb, needle) in [
            ("", "1", "http://b", "url"),
            ("http://a", "", "http://b", "id"),
            ("http://a", "1", "", "callback"),
        ] {
            let err = Task::new(url, id, cb).unwrap_err();
            assert!(err.to_string().contains(needle), "got: {err}");
        }
    }

    #[test]
    fn non_numeric_id_rejected() {
        for id in ["abc", "12a", "../etc", "-3", "1.5"] {
            let err = Task::new("http://a", id, "http://b").unwrap_err();
            assert!(err.to_string().contains("not a number"), "id {id}: {err}");
        }
    }
}
