use serde::Serialize;
use thiserror::Error;

/// User-friendly error presentation for the command line.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Crate-wide error type.
///
/// Every variant is fatal to a routing run. Destination files already written
/// are left as they are.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Input ─────────────────────────────────────────────────────────────────
    #[error("Failed to read input: {0}")]
    InputRead(String),

    #[error("Input line {line} is not valid UTF-8")]
    NotUtf8 { line: u64 },

    // ── Output ────────────────────────────────────────────────────────────────
    #[error("Failed to create output directory: {0}")]
    OutputDir(String),

    #[error("Routing key {key:?} does not name a file inside the output directory")]
    InvalidKey { key: String },

    #[error("Failed to open destination {path}: {message}")]
    DestinationOpen { path: String, message: String },

    #[error("Failed to write destination {path}: {message}")]
    DestinationWrite { path: String, message: String },

    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Converts the error into a presentation suitable for printing to stderr.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Input ─────────────────────────────────────────────────────────
            AppError::InputRead(msg) => ErrorPresentation {
                title: "Input Unreadable".into(),
                message: format!("Could not read the input: {}", msg),
                action: Some("Check that the input file exists and is readable".into()),
            },

            AppError::NotUtf8 { line } => ErrorPresentation {
                title: "Invalid Input Encoding".into(),
                message: format!("Line {} of the input is not valid UTF-8.", line),
                action: Some("Convert the input to UTF-8".into()),
            },

            // ── Output ────────────────────────────────────────────────────────
            AppError::OutputDir(msg) => ErrorPresentation {
                title: "Output Directory Unavailable".into(),
                message: format!("Could not create the output directory: {}", msg),
                action: Some("Check permissions on the output directory".into()),
            },

            AppError::InvalidKey { key } => ErrorPresentation {
                title: "Unsafe Routing Key".into(),
                message: format!(
                    "The key {:?} would place an output file outside the output directory.",
                    key
                ),
                action: Some("Fix the key field value in the input".into()),
            },

            AppError::DestinationOpen { path, message } => ErrorPresentation {
                title: "Cannot Open Output File".into(),
                message: format!("Could not open {}: {}", path, message),
                action: Some("Check permissions on the output directory".into()),
            },

            AppError::DestinationWrite { path, message } => ErrorPresentation {
                title: "Write Failed".into(),
                message: format!(
                    "Could not write to {}: {}. Output files may be incomplete.",
                    path, message
                ),
                action: Some("Clear the output directory and run again".into()),
            },

            // ── Configuration ─────────────────────────────────────────────────
            AppError::InvalidConfig(msg) => ErrorPresentation {
                title: "Invalid Options".into(),
                message: msg.clone(),
                action: Some("Fix the command line options and try again".into()),
            },

            // ── Generic ───────────────────────────────────────────────────────
            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong while routing records.".into(),
                action: None,
            },
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<AppError> {
        vec![
            AppError::InputRead("permission denied".into()),
            AppError::NotUtf8 { line: 7 },
            AppError::OutputDir("read-only file system".into()),
            AppError::InvalidKey { key: "../etc".into() },
            AppError::DestinationOpen {
                path: "out/east.csv".into(),
                message: "permission denied".into(),
            },
            AppError::DestinationWrite {
                path: "out/east.csv".into(),
                message: "no space left on device".into(),
            },
            AppError::InvalidConfig("key field must be at least 1".into()),
            AppError::Internal("task join error".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_title_and_message() {
        for variant in all_variants() {
            let presentation = variant.to_presentation();
            assert!(
                !presentation.title.trim().is_empty(),
                "Empty title for {:?}",
                variant
            );
            assert!(
                !presentation.message.trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn output_errors_name_the_path() {
        let open = AppError::DestinationOpen {
            path: "out/west.csv".into(),
            message: "denied".into(),
        };
        assert!(open.to_presentation().message.contains("out/west.csv"));
        assert!(open.to_string().contains("out/west.csv"));

        let write = AppError::DestinationWrite {
            path: "out/west.csv".into(),
            message: "disk full".into(),
        };
        let presentation = write.to_presentation();
        assert!(presentation.message.contains("out/west.csv"));
        assert!(presentation.message.contains("incomplete"));
    }

    #[test]
    fn invalid_key_names_the_key() {
        let err = AppError::InvalidKey { key: "/tmp/evil".into() };
        assert!(err.to_string().contains("/tmp/evil"));
        assert!(err.to_presentation().message.contains("/tmp/evil"));
    }

    #[test]
    fn not_utf8_reports_line_number() {
        let err = AppError::NotUtf8 { line: 42 };
        assert_eq!(err.to_string(), "Input line 42 is not valid UTF-8");
        assert!(err.to_presentation().message.contains("42"));
    }

    #[test]
    fn internal_error_hides_details() {
        let presentation = AppError::Internal("JoinError::Panic".into()).to_presentation();
        assert!(!presentation.message.contains("JoinError"));
        assert!(presentation.action.is_none());
    }

    #[test]
    fn serialization_produces_valid_json_with_required_fields() {
        for variant in all_variants() {
            let json = serde_json::to_string(&variant)
                .unwrap_or_else(|e| panic!("Failed to serialize {:?}: {}", variant, e));

            let parsed: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|e| panic!("Failed to parse JSON for {:?}: {}", variant, e));

            assert!(parsed.get("title").is_some(), "{:?} missing 'title'", variant);
            assert!(parsed.get("message").is_some(), "{:?} missing 'message'", variant);
            assert!(parsed.get("action").is_some(), "{:?} missing 'action'", variant);
        }
    }
}
