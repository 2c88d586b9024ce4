//! Reporter abstraction — turns a service's health into an external signal.
//!
//! A reporter is selected by the `type` tag of its JSON config fragment and
//! built by [`build`].  Construction is two-phase on both axes:
//!
//! 1. a tolerant decode reads only the tag,
//! 2. the registered constructor yields a zero-value backend,
//! 3. common init derives the diagnostic fields,
//! 4. a second, full decode fills the backend's own settings,
//! 5. backend init acquires whatever the backend needs.
//!
//! Common init always runs on the tag-only instance, strictly before the full
//! decode, so backend init can rely on the diagnostic fields being present.
//!
//! [`AnyReporter`] is an enum over the registered backends; adding one means
//! a new module, a new variant, a new [`REGISTRY`] row and its delegation arm.

pub mod common;
pub mod console;
#[cfg(feature = "reporter-etcd")]
pub mod etcd;
pub mod file;

use std::future::Future;

use serde::Deserialize;
use tracing::debug;

use crate::error::{BuildError, InitError, ReportError};
use crate::fields::Fields;
use crate::json;
use crate::report::Report;
use crate::service::ServiceContext;

pub use common::ReporterCommon;
pub use console::ConsoleReporter;
#[cfg(feature = "reporter-etcd")]
pub use etcd::EtcdReporter;
pub use file::FileReporter;

// ── Capability ────────────────────────────────────────────────────────────────

/// Contract every reporter backend satisfies.
///
/// `report` and `destroy` take `&mut self`, so a single instance is never
/// driven concurrently.  Scheduling is entirely up to the caller.
pub trait Reporter: Send {
    fn common(&self) -> &ReporterCommon;

    fn common_mut(&mut self) -> &mut ReporterCommon;

    /// First init phase, run before the full config is applied.
    fn init_common(&mut self, service: &dyn ServiceContext) -> Result<(), InitError> {
        self.common_mut().init(service)
    }

    /// Decode the full config fragment into this backend's settings.
    fn configure(&mut self, raw: &[u8]) -> Result<(), serde_json::Error>;

    /// Second init phase.  Must either fully succeed or leave nothing acquired.
    fn init(
        &mut self,
        service: &dyn ServiceContext,
    ) -> impl Future<Output = Result<(), InitError>> + Send;

    /// Deliver one report.  May be called any number of times.
    fn report(&mut self, report: &Report) -> impl Future<Output = Result<(), ReportError>> + Send;

    /// Release everything either init phase acquired.
    ///
    /// Safe after a failed init, and idempotent.
    fn destroy(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Diagnostic fields for caller-side log correlation.
    fn fields(&self) -> Fields {
        self.common().fields()
    }
}

// ── Backend enum ──────────────────────────────────────────────────────────────

/// All available reporter backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
pub enum AnyReporter {
    File(FileReporter),
    Console(ConsoleReporter),
    #[cfg(feature = "reporter-etcd")]
    Etcd(EtcdReporter),
}

macro_rules! delegate {
    ($self:ident, $r:ident => $body:expr) => {
        match $self {
            AnyReporter::File($r) => $body,
            AnyReporter::Console($r) => $body,
            #[cfg(feature = "reporter-etcd")]
            AnyReporter::Etcd($r) => $body,
        }
    };
}

impl AnyReporter {
    pub fn kind(&self) -> &'static str {
        delegate!(self, r => r.common().kind())
    }
}

impl Reporter for AnyReporter {
    fn common(&self) -> &ReporterCommon {
        delegate!(self, r => r.common())
    }

    fn common_mut(&mut self) -> &mut ReporterCommon {
        delegate!(self, r => r.common_mut())
    }

    fn init_common(&mut self, service: &dyn ServiceContext) -> Result<(), InitError> {
        delegate!(self, r => r.init_common(service))
    }

    fn configure(&mut self, raw: &[u8]) -> Result<(), serde_json::Error> {
        delegate!(self, r => r.configure(raw))
    }

    async fn init(&mut self, service: &dyn ServiceContext) -> Result<(), InitError> {
        delegate!(self, r => r.init(service).await)
    }

    async fn report(&mut self, report: &Report) -> Result<(), ReportError> {
        delegate!(self, r => r.report(report).await)
    }

    async fn destroy(&mut self) {
        delegate!(self, r => r.destroy().await)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

type Constructor = fn() -> AnyReporter;

fn new_file() -> AnyReporter {
    AnyReporter::File(FileReporter::new())
}

fn new_console() -> AnyReporter {
    AnyReporter::Console(ConsoleReporter::new())
}

#[cfg(feature = "reporter-etcd")]
fn new_etcd() -> AnyReporter {
    AnyReporter::Etcd(EtcdReporter::new())
}

/// Closed tag → constructor table, fixed at compile time.
#[cfg(feature = "reporter-etcd")]
pub const REGISTRY: &[(&str, Constructor)] = &[
    (file::TYPE, new_file),
    (console::TYPE, new_console),
    (etcd::TYPE, new_etcd),
];

/// Closed tag → constructor table, fixed at compile time.
#[cfg(not(feature = "reporter-etcd"))]
pub const REGISTRY: &[(&str, Constructor)] = &[
    (file::TYPE, new_file),
    (console::TYPE, new_console),
];

/// Tags accepted by [`build`], in registry order.
pub fn supported_types() -> Vec<&'static str> {
    REGISTRY.iter().map(|(tag, _)| *tag).collect()
}

fn constructor(kind: &str) -> Option<Constructor> {
    REGISTRY
        .iter()
        .find(|(tag, _)| *tag == kind)
        .map(|(_, ctor)| *ctor)
}

/// Only the tag; every other key is ignored on the first pass.
#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "type")]
    kind: String,
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Build a ready reporter from its raw JSON config fragment.
///
/// No partially built reporter is ever returned.  If backend init fails the
/// instance is destroyed before the error is returned.
pub async fn build(raw: &[u8], service: &dyn ServiceContext) -> Result<AnyReporter, BuildError> {
    let tag: TypeTag = json::from_object(raw).map_err(|source| BuildError::ConfigUnreadable {
        fields: service.fields().clone(),
        source,
    })?;

    let Some(ctor) = constructor(&tag.kind) else {
        return Err(BuildError::UnsupportedType {
            fields: service.fields().with("type", &tag.kind),
            kind: tag.kind,
        });
    };

    let mut reporter = ctor();

    if let Err(source) = reporter.init_common(service) {
        return Err(BuildError::CommonInit { fields: reporter.fields(), source });
    }

    if let Err(source) = reporter.configure(raw) {
        return Err(BuildError::ConfigDecode { fields: reporter.fields(), source });
    }

    if let Err(source) = reporter.init(service).await {
        let fields = reporter.fields();
        reporter.destroy().await;
        return Err(BuildError::SpecificInit { fields, source });
    }

    debug!(fields = %reporter.fields(), "reporter ready");
    Ok(reporter)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Clonable in-memory writer for capturing console output.
    #[derive(Clone, Default)]
    pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
