//! Agent runner — drives check → report cycles for every configured service.
//!
//! Each service gets a [`ServiceRunner`] on its own tokio task.  The runner
//! owns the service's reporters and reacts to the two report failure classes:
//! a transient error keeps the reporter for the next cycle, a permanent one
//! destroys it and rebuilds it from its raw config on the next tick.

use std::error::Error;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::check;
use crate::config::{Config, ServiceConfig};
use crate::error::{AppError, BuildError};
use crate::report::Report;
use crate::reporter::{self, AnyReporter, Reporter};
use crate::service::{Service, ServiceContext};

/// One reporter config fragment and its live instance, if built.
struct Slot {
    raw: Vec<u8>,
    reporter: Option<AnyReporter>,
}

pub struct ServiceRunner {
    service: Service,
    slots: Vec<Slot>,
    check_timeout: Duration,
    last_available: Option<bool>,
}

impl ServiceRunner {
    pub fn new(config: &ServiceConfig, check_timeout: Duration) -> Self {
        Self {
            service: config.to_service(),
            slots: config
                .reporters
                .iter()
                .map(|raw| Slot { raw: raw.clone(), reporter: None })
                .collect(),
            check_timeout,
            last_available: None,
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Reporters currently alive, in config order.
    pub fn reporters(&self) -> impl Iterator<Item = &AnyReporter> {
        self.slots.iter().filter_map(|s| s.reporter.as_ref())
    }

    /// Build every reporter.  On the first failure, the ones already built
    /// are destroyed and the error is returned.
    pub async fn start(&mut self) -> Result<(), BuildError> {
        for i in 0..self.slots.len() {
            match reporter::build(&self.slots[i].raw, &self.service).await {
                Ok(r) => {
                    info!(fields = %r.fields(), "reporter started");
                    self.slots[i].reporter = Some(r);
                }
                Err(e) => {
                    self.shutdown().await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Run one health check and push the result to every reporter.
    pub async fn tick(&mut self) {
        let result = check::tcp(self.service.host(), self.service.port(), self.check_timeout).await;
        let report = Report::from_service(
            &self.service,
            result.as_ref().err().map(|e| e as &dyn Error),
        );

        if self.last_available != Some(report.available) {
            match &result {
                Ok(()) => info!(fields = %self.service.fields(), "service available"),
                Err(e) => warn!(fields = %self.service.fields(), error = %e, "service unavailable"),
            }
            self.last_available = Some(report.available);
        }

        self.deliver(&report).await;
    }

    /// Push `report` to every reporter, rebuilding any that were dropped.
    pub async fn deliver(&mut self, report: &Report) {
        for slot in self.slots.iter_mut() {
            if slot.reporter.is_none() {
                match reporter::build(&slot.raw, &self.service).await {
                    Ok(r) => {
                        info!(fields = %r.fields(), "reporter rebuilt");
                        slot.reporter = Some(r);
                    }
                    Err(e) => {
                        warn!(fields = %e.fields(), error = %e, "reporter rebuild failed");
                        continue;
                    }
                }
            }
            let Some(r) = slot.reporter.as_mut() else {
                continue;
            };

            match r.report(report).await {
                Ok(()) => debug!(fields = %r.fields(), available = report.available, "reported"),
                Err(e) if e.is_transient() => {
                    warn!(fields = %r.fields(), error = %e, "report failed, will retry");
                }
                Err(e) => {
                    error!(fields = %r.fields(), error = %e, "reporter unusable, rebuilding");
                    r.destroy().await;
                    slot.reporter = None;
                }
            }
        }
    }

    /// Destroy every reporter.
    pub async fn shutdown(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(mut r) = slot.reporter.take() {
                r.destroy().await;
                debug!(fields = %r.fields(), "reporter destroyed");
            }
        }
    }
}

/// Start every service and run check cycles until `shutdown` is cancelled.
///
/// Any reporter that fails to build at startup aborts the whole run; services
/// already started are torn down first.
pub async fn run(config: &Config, shutdown: CancellationToken) -> Result<(), AppError> {
    let mut runners: Vec<ServiceRunner> = Vec::with_capacity(config.services.len());
    for service in &config.services {
        let mut runner = ServiceRunner::new(service, config.check_timeout);
        if let Err(e) = runner.start().await {
            for started in runners.iter_mut() {
                started.shutdown().await;
            }
            return Err(e.into());
        }
        runners.push(runner);
    }

    info!(services = runners.len(), "agent running");

    let mut handles = Vec::with_capacity(runners.len());
    for mut runner in runners {
        let interval = config.check_interval;
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => runner.tick().await,
                }
            }
            runner.shutdown().await;
            info!(fields = %runner.service().fields(), "service stopped");
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "service task panicked");
        }
    }
    Ok(())
}
