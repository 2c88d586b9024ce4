//! Common reporter state, embedded by every backend.
//!
//! Holds the type tag and the diagnostic chain derived from the owning
//! service.  It deliberately has no `init`/`report` of its own: those are
//! required methods of [`Reporter`](super::Reporter).

use crate::error::InitError;
use crate::fields::Fields;
use crate::service::ServiceContext;

#[derive(Debug, Clone)]
pub struct ReporterCommon {
    kind: &'static str,
    fields: Option<Fields>,
}

impl ReporterCommon {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, fields: None }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Derive the diagnostic chain: the service's fields plus `type=<kind>`.
    pub fn init(&mut self, service: &dyn ServiceContext) -> Result<(), InitError> {
        self.fields = Some(service.fields().with("type", self.kind));
        Ok(())
    }

    /// Diagnostic chain; before common init it carries only the type.
    pub fn fields(&self) -> Fields {
        match &self.fields {
            Some(f) => f.clone(),
            None => Fields::new().with("type", self.kind),
        }
    }

    /// Diagnostic chain, or an error if common init has not run yet.
    ///
    /// Backends call this first in their own `init`.
    pub fn ready_fields(&self) -> Result<&Fields, InitError> {
        self.fields.as_ref().ok_or(InitError::CommonNotInitialised)
    }
}
