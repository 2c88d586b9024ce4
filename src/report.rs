//! Status snapshot — one point-in-time health report for a service.
//!
//! This is the exact shape every backend emits:
//!
//! ```json
//! {"available":true,"host":"10.0.0.5","port":8080,
//!  "haproxy_server_options":"weight 10","labels":{"az":"us-east-1a"}}
//! ```

use std::collections::BTreeMap;
use std::error::Error;

use serde::{Deserialize, Serialize};

use crate::error::MalformedReport;
use crate::json;
use crate::service::ServiceContext;

/// Immutable health snapshot.  Missing or `null` keys decode to their zero
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    #[serde(deserialize_with = "json::null_as_default")]
    pub available: bool,
    #[serde(deserialize_with = "json::null_as_default")]
    pub host: String,
    #[serde(deserialize_with = "json::null_as_default")]
    pub port: u16,
    /// Opaque load-balancer directives; never interpreted here.
    #[serde(rename = "haproxy_server_options", deserialize_with = "json::null_as_default")]
    pub server_options: String,
    #[serde(deserialize_with = "json::null_as_default")]
    pub labels: BTreeMap<String, String>,
}

impl Report {
    /// Snapshot `service` after a check that ended with `last_error`.
    ///
    /// `available` depends only on whether an error is present, never on
    /// what the error says.
    pub fn from_service(service: &dyn ServiceContext, last_error: Option<&dyn Error>) -> Self {
        Self {
            available: last_error.is_none(),
            host: service.host().to_string(),
            port: service.port(),
            server_options: service.server_options().to_string(),
            labels: service.labels().clone(),
        }
    }

    pub fn from_json(content: &[u8]) -> Result<Self, MalformedReport> {
        Ok(json::from_object(content)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
