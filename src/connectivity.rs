//! Online/offline tracking.
//!
//! The observer is a shared flag that anything can report into; a store
//! attached to it pauses its heartbeat while offline and refetches as soon as
//! the flag flips back to online. `spawn_probe` feeds the flag from periodic
//! TCP reachability checks against the API host.
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConnectivityObserver {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityObserver {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Record a connectivity signal. Returns true when it changed the state.
    pub fn report(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                info!("connectivity restored");
            } else {
                warn!("connectivity lost");
            }
        }
        changed
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Probe `target` every `every` and report the result. Stops when the
    /// returned handle is dropped.
    pub fn spawn_probe(&self, target: ProbeTarget, every: Duration, timeout: Duration) -> ProbeHandle {
        let observer = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = probe(&target, timeout).await;
                observer.report(online);
            }
        });
        ProbeHandle(task)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url
            .host_str()?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        Some(Self {
            host,
            port: url.port_or_known_default()?,
        })
    }
}

/// One reachability check: can a TCP connection be opened within `timeout`?
pub async fn probe(target: &ProbeTarget, timeout: Duration) -> bool {
    let connect = TcpStream::connect((target.host.as_str(), target.port));
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            debug!(?err, host = %target.host, port = target.port, "probe failed");
            false
        }
        Err(_) => {
            debug!(host = %target.host, port = target.port, "probe timed out");
            false
        }
    }
}

#[derive(Debug)]
pub struct ProbeHandle(JoinHandle<()>);

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
