use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use log::info;
use tokio::{net::TcpStream, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::monitor::ReachabilityMonitor;
use crate::config::SyncConfig;

const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info};

/// True when a TCP connection to `addr` opens within `timeout`.
pub async fn probe_once(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            log_debug!("probe {addr} failed: {err}");
            false
        }
        Err(_) => {
            log_debug!("probe {addr} timed out after {timeout:?}");
            false
        }
    }
}

pub async fn probe_loop(
    monitor: Arc<ReachabilityMonitor>,
    addr: String,
    interval: Duration,
    timeout: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let online = probe_once(&addr, timeout).await;
                monitor.report(online);
            }
            _ = cancel_token.cancelled() => {
                log_info!("reachability probe shutting down");
                break;
            }
        }
    }
}

/// Owns the background probe task.
pub struct ReachabilityProbe {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for ReachabilityProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ReachabilityProbe {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, monitor: Arc<ReachabilityMonitor>, config: &SyncConfig) -> Result<()> {
        if self.handle.is_some() {
            bail!("reachability probe already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(probe_loop(
            monitor,
            config.probe_addr.clone(),
            config.probe_interval,
            config.probe_timeout,
            cancel_token.clone(),
        ));
        info!(
            "Probing {} every {:?}",
            config.probe_addr, config.probe_interval
        );

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("reachability probe task failed to join")
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::ReachabilityEvent;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_detects_open_and_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(probe_once(&addr, Duration::from_secs(1)).await);

        drop(listener);
        assert!(!probe_once(&addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn probe_loop_reports_into_monitor() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = SyncConfig {
            probe_addr: listener.local_addr().unwrap().to_string(),
            probe_interval: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(500),
            ..SyncConfig::default()
        };
        let monitor = Arc::new(ReachabilityMonitor::new());
        let mut events = monitor.subscribe();

        let mut probe = ReachabilityProbe::new();
        probe.start(monitor.clone(), &config).unwrap();
        assert!(probe.start(monitor.clone(), &config).is_err());

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, ReachabilityEvent::BecameReachable);
        assert!(monitor.is_reachable());

        probe.stop().await.unwrap();
        assert!(!probe.is_running());
    }
}
