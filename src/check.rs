//! TCP health check — the pass/fail signal fed into reports.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },
}

/// Succeeds if a TCP connection to `host:port` opens within `timeout`.
pub async fn tcp(host: &str, port: u16, timeout: Duration) -> Result<(), CheckError> {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(source)) => Err(CheckError::Connect { addr, source }),
        Err(_) => Err(CheckError::Timeout { addr, timeout }),
    }
}
