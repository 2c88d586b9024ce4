//! `console` reporter — prints each report as JSON on stdout.

use std::io::{self, Write};

use serde::Deserialize;

use crate::error::{InitError, ReportError};
use crate::json;
use crate::report::Report;
use crate::service::ServiceContext;

use super::{Reporter, ReporterCommon};

pub const TYPE: &str = "console";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Multi-line indented output instead of one line per report.
    pub pretty: bool,
}

pub struct ConsoleReporter {
    common: ReporterCommon,
    settings: ConsoleSettings,
    out: Box<dyn Write + Send>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            common: ReporterCommon::new(TYPE),
            settings: ConsoleSettings::default(),
            out: Box::new(io::stdout()),
        }
    }

    /// Send output somewhere other than stdout.
    pub fn redirect(&mut self, out: impl Write + Send + 'static) {
        self.out = Box::new(out);
    }

    fn render(&self, report: &Report) -> Result<String, serde_json::Error> {
        if self.settings.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn common(&self) -> &ReporterCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut ReporterCommon {
        &mut self.common
    }

    fn configure(&mut self, raw: &[u8]) -> Result<(), serde_json::Error> {
        self.settings = json::from_object(raw)?;
        Ok(())
    }

    async fn init(&mut self, _service: &dyn ServiceContext) -> Result<(), InitError> {
        self.common.ready_fields()?;
        Ok(())
    }

    async fn report(&mut self, report: &Report) -> Result<(), ReportError> {
        let fields = self.common.fields();
        let text = self
            .render(report)
            .map_err(|e| ReportError::permanent(&fields, format!("cannot encode report: {e}")))?;
        writeln!(self.out, "{text}")
            .and_then(|_| self.out.flush())
            .map_err(|e| ReportError::transient(&fields, format!("console write failed: {e}")))
    }
}
