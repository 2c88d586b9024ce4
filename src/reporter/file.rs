//! `file` reporter — writes the latest report as a JSON line to a file.
//!
//! ```json
//! {"type": "file", "path": "~/.vigil/api.report", "append": false}
//! ```
//!
//! By default the file is rewritten on every report so it always holds the
//! current state; with `append` each report adds a line.  Parent
//! directories are not created: init must not leave anything behind on
//! failure.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::config::expand_home;
use crate::error::{InitError, ReportError};
use crate::json;
use crate::report::Report;
use crate::service::ServiceContext;

use super::{Reporter, ReporterCommon};

pub const TYPE: &str = "file";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Target file; a leading `~` is expanded.
    pub path: String,
    /// Append one line per report instead of rewriting the file.
    pub append: bool,
}

pub struct FileReporter {
    common: ReporterCommon,
    settings: FileSettings,
    file: Option<File>,
    path: PathBuf,
}

impl FileReporter {
    pub fn new() -> Self {
        Self {
            common: ReporterCommon::new(TYPE),
            settings: FileSettings::default(),
            file: None,
            path: PathBuf::new(),
        }
    }

    pub fn settings(&self) -> &FileSettings {
        &self.settings
    }

    fn write_report(file: &mut File, line: &[u8], append: bool) -> std::io::Result<()> {
        if !append {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
        }
        file.write_all(line)?;
        file.flush()
    }
}

impl Default for FileReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for FileReporter {
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
        let fields = self.common.ready_fields()?.clone();
        if self.settings.path.is_empty() {
            return Err(InitError::Settings("file reporter requires 'path'".into()));
        }

        let path = expand_home(&self.settings.path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.settings.append)
            .open(&path)?;

        debug!(fields = %fields, path = %path.display(), append = self.settings.append, "file reporter opened");
        self.file = Some(file);
        self.path = path;
        Ok(())
    }

    async fn report(&mut self, report: &Report) -> Result<(), ReportError> {
        let fields = self.common.fields();
        let Some(file) = self.file.as_mut() else {
            return Err(ReportError::permanent(&fields, "file reporter is not open"));
        };
        let mut line = report
            .to_json()
            .map_err(|e| ReportError::permanent(&fields, format!("cannot encode report: {e}")))?;
        line.push(b'\n');

        Self::write_report(file, &line, self.settings.append).map_err(|e| {
            ReportError::transient(&fields, format!("write to {} failed: {e}", self.path.display()))
        })
    }

    async fn destroy(&mut self) {
        if self.file.take().is_some() {
            debug!(fields = %self.common.fields(), "file reporter closed");
        }
    }
}
