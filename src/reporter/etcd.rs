//! `etcd` reporter — publishes the report under an ephemeral etcd key.
//!
//! ```json
//! {"type": "etcd", "endpoints": ["127.0.0.1:2379"],
//!  "path": "/vigil/services/api", "ttl_secs": 10}
//! ```
//!
//! Init connects and grants a lease; the key `<path>/<name>` is always
//! written bound to that lease, so it disappears when the agent stops
//! refreshing it.  A background task owned by the reporter refreshes the
//! lease every third of its ttl, independent of how often reports arrive.

use std::future::Future;
use std::time::Duration;

use etcd_client::{Client, ConnectOptions, LeaseKeepAliveStream, LeaseKeeper, PutOptions};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{InitError, ReportError};
use crate::fields::Fields;
use crate::json;
use crate::report::Report;
use crate::service::ServiceContext;

use super::{Reporter, ReporterCommon};

pub const TYPE: &str = "etcd";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtcdSettings {
    pub endpoints: Vec<String>,
    /// Key prefix the service entry lives under.
    pub path: String,
    /// Entry name; defaults to `<host>_<port>` of the owning service.
    pub name: Option<String>,
    pub ttl_secs: i64,
    /// Bound on connecting and on every request.
    pub connect_timeout_ms: u64,
}

impl EtcdSettings {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// How often the lease is refreshed: a third of its ttl.
    fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.ttl_secs.max(1) as u64 * 1000 / 3)
    }
}

impl Default for EtcdSettings {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            path: "/vigil/services".to_string(),
            name: None,
            ttl_secs: 10,
            connect_timeout_ms: 2000,
        }
    }
}

/// Outcome of one lease refresh round trip.
#[derive(Debug, PartialEq, Eq)]
enum LeaseState {
    Alive,
    Lost(String),
}

/// One lease refresh.  `Err` is a failure worth retrying on the next period.
trait LeaseRefresh: Send + 'static {
    fn refresh(&mut self) -> impl Future<Output = Result<LeaseState, String>> + Send;
}

struct KeepAlive {
    keeper: LeaseKeeper,
    responses: LeaseKeepAliveStream,
    timeout: Duration,
}

impl LeaseRefresh for KeepAlive {
    async fn refresh(&mut self) -> Result<LeaseState, String> {
        self.keeper
            .keep_alive()
            .await
            .map_err(|e| format!("keep-alive request failed: {e}"))?;

        match tokio::time::timeout(self.timeout, self.responses.message()).await {
            Ok(Ok(Some(resp))) if resp.ttl() > 0 => Ok(LeaseState::Alive),
            Ok(Ok(Some(_))) => Ok(LeaseState::Lost("lease expired".into())),
            Ok(Ok(None)) => Ok(LeaseState::Lost("keep-alive stream closed".into())),
            Ok(Err(e)) => Err(format!("keep-alive response failed: {e}")),
            Err(_) => Err("keep-alive timed out".into()),
        }
    }
}

/// Refresh `lease` every `period` until `stop` fires.  A lost lease cancels
/// `lost` and ends the task; transient failures are logged and retried.
async fn keep_lease_alive(
    mut lease: impl LeaseRefresh,
    period: Duration,
    stop: CancellationToken,
    lost: CancellationToken,
    fields: Fields,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let outcome = tokio::select! {
            _ = stop.cancelled() => return,
            outcome = lease.refresh() => outcome,
        };
        match outcome {
            Ok(LeaseState::Alive) => {}
            Ok(LeaseState::Lost(reason)) => {
                warn!(fields = %fields, reason = %reason, "etcd lease lost");
                lost.cancel();
                return;
            }
            Err(e) => warn!(fields = %fields, error = %e, "etcd lease refresh failed, retrying"),
        }
    }
}

/// Live connection, the lease the entry is bound to and its refresher.
struct Session {
    client: Client,
    lease_id: i64,
    key: String,
    stop: CancellationToken,
    lost: CancellationToken,
    refresher: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

pub struct EtcdReporter {
    common: ReporterCommon,
    settings: EtcdSettings,
    session: Option<Session>,
}

impl EtcdReporter {
    pub fn new() -> Self {
        Self {
            common: ReporterCommon::new(TYPE),
            settings: EtcdSettings::default(),
            session: None,
        }
    }

    pub fn settings(&self) -> &EtcdSettings {
        &self.settings
    }

    /// Full key for `service`, e.g. `/vigil/services/10.0.0.5_8080`.
    pub fn key_for(&self, service: &dyn ServiceContext) -> String {
        let name = match &self.settings.name {
            Some(name) => name.clone(),
            None => format!("{}_{}", service.host(), service.port()),
        };
        format!("{}/{}", self.settings.path.trim_end_matches('/'), name)
    }

    fn validate(&self) -> Result<(), InitError> {
        if self.settings.endpoints.is_empty() {
            return Err(InitError::Settings("etcd reporter requires 'endpoints'".into()));
        }
        if self.settings.ttl_secs <= 0 {
            return Err(InitError::Settings("'ttl_secs' must be positive".into()));
        }
        Ok(())
    }

    async fn open_session(
        settings: &EtcdSettings,
        key: String,
        fields: Fields,
    ) -> Result<Session, InitError> {
        let timeout = settings.timeout();
        let options = ConnectOptions::new()
            .with_connect_timeout(timeout)
            .with_timeout(timeout);

        let mut client = tokio::time::timeout(
            timeout,
            Client::connect(settings.endpoints.clone(), Some(options)),
        )
        .await
        .map_err(|_| InitError::Timeout(format!("connecting to {:?}", settings.endpoints)))?
        .map_err(|e| InitError::Connect(format!("failed to connect to etcd: {e}")))?;

        let lease_id = client
            .lease_grant(settings.ttl_secs, None)
            .await
            .map_err(|e| InitError::Connect(format!("failed to grant lease: {e}")))?
            .id();

        let (keeper, responses) = match client.lease_keep_alive(lease_id).await {
            Ok(stream) => stream,
            Err(e) => {
                // The lease would expire on its own; revoke it so nothing lingers.
                let _ = client.lease_revoke(lease_id).await;
                return Err(InitError::Connect(format!("failed to open lease keep-alive: {e}")));
            }
        };

        let stop = CancellationToken::new();
        let lost = CancellationToken::new();
        let refresher = tokio::spawn(keep_lease_alive(
            KeepAlive { keeper, responses, timeout },
            settings.refresh_period(),
            stop.clone(),
            lost.clone(),
            fields,
        ));
        Ok(Session { client, lease_id, key, stop, lost, refresher })
    }
}

impl Default for EtcdReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for EtcdReporter {
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

    async fn init(&mut self, service: &dyn ServiceContext) -> Result<(), InitError> {
        let fields = self.common.ready_fields()?.clone();
        self.validate()?;

        let key = self.key_for(service);
        let session = Self::open_session(&self.settings, key, fields.clone()).await?;
        debug!(fields = %fields, key = %session.key, lease = session.lease_id, "etcd session established");
        self.session = Some(session);
        Ok(())
    }

    async fn report(&mut self, report: &Report) -> Result<(), ReportError> {
        let fields = self.common.fields();
        let Some(session) = self.session.as_mut() else {
            return Err(ReportError::permanent(&fields, "etcd session not established"));
        };
        if session.lost.is_cancelled() {
            return Err(ReportError::permanent(&fields, format!("lease {} lost", session.lease_id)));
        }

        let value = report
            .to_json()
            .map_err(|e| ReportError::permanent(&fields, format!("cannot encode report: {e}")))?;
        session
            .client
            .put(
                session.key.as_str(),
                value,
                Some(PutOptions::new().with_lease(session.lease_id)),
            )
            .await
            .map_err(|e| ReportError::transient(&fields, format!("put {} failed: {e}", session.key)))?;
        Ok(())
    }

    async fn destroy(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.stop.cancel();
        if let Err(e) = (&mut session.refresher).await {
            warn!(fields = %self.common.fields(), error = %e, "etcd lease refresher panicked");
        }
        // Revoking the lease deletes the key with it.
        if let Err(e) = session.client.lease_revoke(session.lease_id).await {
            warn!(fields = %self.common.fields(), error = %e, "failed to revoke etcd lease");
        } else {
            debug!(fields = %self.common.fields(), key = %session.key, "etcd entry removed");
        }
    }
}
