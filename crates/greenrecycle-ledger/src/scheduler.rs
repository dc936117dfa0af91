//! Background scheduler for the expiry sweeps.
//!
//! ```text
//! start ─▶ warm-up ─▶ sweep ─▶ sleep(interval) ─▶ sweep ─▶ …
//!                        ▲                                   │
//!                        └──────────── stop() ◀──────────────┘
//! ```
//!
//! The scheduler owns its task handles; there is no global registry.
//! `stop()` signals shutdown and joins both tasks. A sweep in progress
//! finishes the record it is on (its own transaction) and then returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use greenrecycle_types::{LedgerConfig, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::sweeper::ExpirySweeper;

/// Receiving side of a shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

impl Shutdown {
    /// A linked trigger and signal.
    #[must_use]
    pub fn channel() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Self { rx: Some(rx) })
    }

    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self { rx: None }
    }

    #[must_use]
    pub fn is_signalled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once shutdown is signalled or the trigger is dropped.
    pub async fn wait(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Sending side of a shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }
}

/// Owns the two periodic sweep tasks.
pub struct Scheduler {
    trigger: ShutdownTrigger,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    /// Spawn the order and withdrawal sweeps. Must be called inside a tokio
    /// runtime.
    #[must_use]
    pub fn start(sweeper: Arc<ExpirySweeper>, config: &LedgerConfig) -> Self {
        let (trigger, shutdown) = Shutdown::channel();
        let warmup = config.warmup();

        let orders = {
            let sweeper = Arc::clone(&sweeper);
            spawn_periodic(
                "order-expiry",
                warmup,
                config.order_sweep.interval(),
                shutdown.clone(),
                move |signal| {
                    let sweeper = Arc::clone(&sweeper);
                    async move { sweeper.sweep_expired_orders_until(&signal).await }
                },
            )
        };
        let withdrawals = spawn_periodic(
            "withdrawal-expiry",
            warmup,
            config.withdrawal_sweep.interval(),
            shutdown,
            move |signal| {
                let sweeper = Arc::clone(&sweeper);
                async move { sweeper.sweep_expired_withdrawals_until(&signal).await }
            },
        );

        info!(
            warmup_secs = warmup.as_secs(),
            order_interval_secs = config.order_sweep.interval_secs,
            withdrawal_interval_secs = config.withdrawal_sweep.interval_secs,
            "Scheduler started"
        );
        Self {
            trigger,
            tasks: vec![
                ("order-expiry", orders),
                ("withdrawal-expiry", withdrawals),
            ],
        }
    }

    /// Signal shutdown and wait for both tasks to exit.
    pub async fn stop(self) {
        self.trigger.fire();
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                error!(task = name, error = %e, "Scheduler task panicked");
            }
        }
        info!("Scheduler stopped");
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    warmup: Duration,
    interval: Duration,
    mut shutdown: Shutdown,
    mut run: F,
) -> JoinHandle<()>
where
    F: FnMut(Shutdown) -> Fut + Send + 'static,
    Fut: Future<Output = Result<usize>> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.wait() => return,
            () = tokio::time::sleep(warmup) => {}
        }
        loop {
            // Counts are logged by the sweep itself.
            if let Err(e) = run(shutdown.clone()).await {
                warn!(task = name, error = %e, "Sweep failed");
            }
            tokio::select! {
                () = shutdown.wait() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_is_not_signalled() {
        let shutdown = Shutdown::never();
        assert!(!shutdown.is_signalled());
    }

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let (trigger, mut shutdown) = Shutdown::channel();
        let observer = shutdown.clone();
        assert!(!observer.is_signalled());

        let waiter = tokio::spawn(async move { shutdown.wait().await });
        trigger.fire();
        waiter.await.unwrap();
        assert!(observer.is_signalled());
    }

    #[tokio::test]
    async fn dropped_trigger_releases_waiters() {
        let (trigger, mut shutdown) = Shutdown::channel();
        drop(trigger);
        shutdown.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_survives_failures_and_stops_on_signal() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use greenrecycle_types::RecycleError;

        let runs = Arc::new(AtomicUsize::new(0));
        let (trigger, shutdown) = Shutdown::channel();
        let counter = Arc::clone(&runs);
        let handle = spawn_periodic(
            "test",
            Duration::from_secs(1),
            Duration::from_secs(10),
            shutdown,
            move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RecycleError::Internal("first run fails".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        trigger.fire();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
