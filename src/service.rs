//! Owning service context — the monitored service a reporter works for.
//!
//! Reporters and the dispatcher only see [`ServiceContext`]; they never
//! reach into the agent's own service state.

use std::collections::BTreeMap;

use crate::fields::Fields;

/// Read-only view of one monitored service instance.
pub trait ServiceContext: Send + Sync {
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    /// Opaque backend tuning string, passed through to reports verbatim.
    fn server_options(&self) -> &str;
    fn labels(&self) -> &BTreeMap<String, String>;
    /// Ambient diagnostic chain that reporters extend with their own type.
    fn fields(&self) -> &Fields;
}

/// A monitored service, resolved from the `[[services]]` config section.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub server_options: String,
    pub labels: BTreeMap<String, String>,
    fields: Fields,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        server_options: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        let name = name.into();
        let host = host.into();
        let fields = Fields::new()
            .with("service", &name)
            .with("host", &host)
            .with("port", port);
        Self {
            name,
            host,
            port,
            server_options: server_options.into(),
            labels,
            fields,
        }
    }
}

impl ServiceContext for Service {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn server_options(&self) -> &str {
        &self.server_options
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }
}
