//! Application-wide error types.
//!
//! Reporter errors are split by lifecycle stage: [`BuildError`] for the
//! dispatcher, [`InitError`] for either init phase, [`ReportError`] for a
//! single delivery.  Build and report failures carry the diagnostic
//! [`Fields`] known at the point of failure.

use thiserror::Error;

use crate::fields::Fields;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("reporter error: {0}")]
    Build(#[from] BuildError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to construct a reporter from its config fragment.
///
/// All variants are permanent for that construction attempt: no partially
/// built reporter survives, and retrying is left to the caller.  The raw
/// config bytes are never included in the message; the parse error is kept
/// as the source.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read reporter type [{fields}]")]
    ConfigUnreadable {
        fields: Fields,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported reporter type '{kind}' [{fields}]")]
    UnsupportedType { kind: String, fields: Fields },

    #[error("failed to init common reporter [{fields}]")]
    CommonInit {
        fields: Fields,
        #[source]
        source: InitError,
    },

    #[error("failed to decode reporter config [{fields}]")]
    ConfigDecode {
        fields: Fields,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to init reporter [{fields}]")]
    SpecificInit {
        fields: Fields,
        #[source]
        source: InitError,
    },
}

impl BuildError {
    pub fn fields(&self) -> &Fields {
        match self {
            BuildError::ConfigUnreadable { fields, .. }
            | BuildError::UnsupportedType { fields, .. }
            | BuildError::CommonInit { fields, .. }
            | BuildError::ConfigDecode { fields, .. }
            | BuildError::SpecificInit { fields, .. } => fields,
        }
    }

}

/// Failure in either reporter init phase.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("common reporter state not initialised")]
    CommonNotInitialised,

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

/// Failure to deliver one report, tagged with the reporter's fields.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The same report may be retried on the next cycle.
    #[error("transient report failure: {message} [{fields}]")]
    Transient { fields: Fields, message: String },

    /// The backend is unusable; the caller should tear it down and rebuild.
    #[error("permanent report failure: {message} [{fields}]")]
    Permanent { fields: Fields, message: String },
}

impl ReportError {
    pub fn transient(fields: &Fields, message: impl Into<String>) -> Self {
        ReportError::Transient { fields: fields.clone(), message: message.into() }
    }

    pub fn permanent(fields: &Fields, message: impl Into<String>) -> Self {
        ReportError::Permanent { fields: fields.clone(), message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ReportError::Transient { .. })
    }

    pub fn fields(&self) -> &Fields {
        match self {
            ReportError::Transient { fields, .. } | ReportError::Permanent { fields, .. } => fields,
        }
    }
}

/// A previously serialised report could not be decoded.
#[derive(Debug, Error)]
#[error("malformed report: {0}")]
pub struct MalformedReport(#[from] pub serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn unsupported_type_names_tag_and_fields() {
        let fields = Fields::new().with("service", "api").with("type", "bogus");
        let e = BuildError::UnsupportedType { kind: "bogus".into(), fields };
        let msg = e.to_string();
        assert!(msg.contains("'bogus'"));
        assert!(msg.contains("service=api"));
        assert_eq!(e.fields().get("service"), Some("api"));
    }

    #[test]
    fn build_error_keeps_init_source() {
        let e = BuildError::SpecificInit {
            fields: Fields::new(),
            source: InitError::Connect("refused".into()),
        };
        let source = e.source().expect("source must be kept");
        assert!(source.to_string().contains("refused"));
    }

    #[test]
    fn report_error_classes() {
        let fields = Fields::new();
        assert!(ReportError::transient(&fields, "busy").is_transient());
        assert!(!ReportError::permanent(&fields, "gone").is_transient());
    }

    #[test]
    fn report_error_shows_fields() {
        let fields = Fields::new().with("service", "api").with("type", "file");
        let e = ReportError::permanent(&fields, "file reporter is not open");
        let msg = e.to_string();
        assert!(msg.contains("file reporter is not open"));
        assert!(msg.contains("service=api type=file"));
        assert_eq!(e.fields().get("type"), Some("file"));
    }
}
