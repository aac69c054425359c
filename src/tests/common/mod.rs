// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::Client;
use tokio::sync::Notify;

use crate::keeper::SingletonKeeper;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Bookkeeping shared between a test and its resolver.
#[derive(Default)]
pub struct Probe {
    /// resolver invocations
    pub calls: AtomicUsize,
    /// resolvers running right now
    pub active: AtomicUsize,
    /// highest value `active` ever reached
    pub max_active: AtomicUsize,
    /// released once per `notify_one`
    pub gate: Notify,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn enter(&self) -> usize {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        n
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeper whose n-th resolution yields `n` after `delay`.
pub fn sequential_keeper(probe: Arc<Probe>, delay: Duration) -> SingletonKeeper<usize> {
    SingletonKeeper::new(move || {
        let probe = probe.clone();
        async move {
            let n = probe.enter();
            tokio::time::sleep(delay).await;
            probe.leave();
            Ok(n)
        }
    })
}

/// Keeper whose resolutions block until the probe's gate is released.
/// With `fail` set every resolution errors out.
pub fn gated_keeper(probe: Arc<Probe>, fail: bool) -> SingletonKeeper<usize> {
    SingletonKeeper::new(move || {
        let probe = probe.clone();
        async move {
            let n = probe.enter();
            probe.gate.notified().await;
            probe.leave();
            if fail {
                Err(anyhow!("resolution {} failed", n))
            } else {
                Ok(n)
            }
        }
    })
}

/// Like [`gated_keeper`] but starts with `seed` cached.
pub fn gated_keeper_with_cache(probe: Arc<Probe>, fail: bool, seed: usize) -> SingletonKeeper<usize> {
    SingletonKeeper::with_resolver_and_cache(
        move || {
            let probe = probe.clone();
            async move {
                let n = probe.enter();
                probe.gate.notified().await;
                probe.leave();
                if fail {
                    Err(anyhow!("resolution {} failed", n))
                } else {
                    Ok(n)
                }
            }
        },
        seed,
        None,
    )
}

/// Waits until the keeper reports a resolution in flight.
pub async fn wait_until_renewing<T: Clone + Send + Sync + 'static>(keeper: &SingletonKeeper<T>) {
    while !keeper.is_renewing() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
