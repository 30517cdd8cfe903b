//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM/SIGINT handling once per process
//! - Turn the first signal into a cancelled token (latched)
//! - Observe and ignore every later signal
//!
//! # Design Decisions
//! - Uses Tokio's signal streams (async-safe)
//! - The token is the only shutdown state; it is threaded explicitly
//!   through every task instead of living in a global
//! - Repeated signals are logged, never re-run shutdown

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("signal handling is already installed in this process")]
    AlreadyInstalled,
    #[error("failed to register signal handler: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct Latch {
    initiated: AtomicBool,
    shutdowns: AtomicUsize,
    received: AtomicUsize,
}

/// Process-wide shutdown coordinator.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    token: CancellationToken,
    latch: Arc<Latch>,
    tasks: TaskTracker,
}

impl ShutdownSignal {
    /// Register SIGTERM and SIGINT. Fails if called twice in one process.
    pub fn install() -> Result<Self, SignalError> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(SignalError::AlreadyInstalled);
        }
        match os_signals() {
            Ok(signals) => Ok(Self::from_stream(signals)),
            Err(e) => {
                INSTALLED.store(false, Ordering::SeqCst);
                Err(SignalError::Io(e))
            }
        }
    }

    /// Coordinator driven by an arbitrary stream of signal names.
    pub fn from_stream<S>(signals: S) -> Self
    where
        S: Stream<Item = &'static str> + Send + 'static,
    {
        let shutdown = Self {
            token: CancellationToken::new(),
            latch: Arc::new(Latch::default()),
            tasks: TaskTracker::new(),
        };

        let listener = shutdown.clone();
        shutdown.tasks.spawn(async move {
            let mut signals = std::pin::pin!(signals);
            while let Some(name) = signals.next().await {
                listener.trigger(name);
            }
        });
        shutdown.tasks.close();
        shutdown
    }

    /// Token cancelled on the first signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Start shutdown on behalf of `source`. Only the first call has an effect.
    pub fn trigger(&self, source: &str) {
        let received = self.latch.received.fetch_add(1, Ordering::SeqCst) + 1;
        if self.latch.initiated.swap(true, Ordering::SeqCst) {
            tracing::warn!(signal = source, received, "Shutdown already in progress, ignoring signal");
            return;
        }
        self.latch.shutdowns.fetch_add(1, Ordering::SeqCst);
        tracing::info!(signal = source, "Shutdown signal received");
        self.token.cancel();
    }

    pub fn shutdowns_initiated(&self) -> usize {
        self.latch.shutdowns.load(Ordering::SeqCst)
    }

    pub fn signals_received(&self) -> usize {
        self.latch.received.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(unix)]
fn os_signals() -> Result<BoxStream<'static, &'static str>, std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm = signal(SignalKind::terminate())?;
    let sigint = signal(SignalKind::interrupt())?;
    Ok(stream::unfold((sigterm, sigint), |(mut term, mut int)| async move {
        let name = tokio::select! {
            Some(()) = term.recv() => "SIGTERM",
            Some(()) = int.recv() => "SIGINT",
            else => return None,
        };
        Some((name, (term, int)))
    })
    .boxed())
}

#[cfg(not(unix))]
fn os_signals() -> Result<BoxStream<'static, &'static str>, std::io::Error> {
    Ok(stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ("ctrl-c", ()))
    })
    .boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn receiver_stream(rx: mpsc::UnboundedReceiver<&'static str>) -> impl Stream<Item = &'static str> {
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|name| (name, rx)) })
    }

    #[tokio::test]
    async fn first_signal_cancels_token() {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = ShutdownSignal::from_stream(receiver_stream(rx));
        let token = shutdown.token();
        assert!(!token.is_cancelled());

        tx.send("SIGTERM").unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait()).await.unwrap();
        assert!(token.is_cancelled());
        assert_eq!(shutdown.shutdowns_initiated(), 1);
    }

    #[tokio::test]
    async fn repeated_signals_run_shutdown_once() {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = ShutdownSignal::from_stream(receiver_stream(rx));

        tx.send("SIGINT").unwrap();
        tx.send("SIGTERM").unwrap();
        tx.send("SIGINT").unwrap();
        drop(tx);
        shutdown.tasks.wait().await;

        assert!(shutdown.is_shutting_down());
        assert_eq!(shutdown.signals_received(), 3);
        assert_eq!(shutdown.shutdowns_initiated(), 1);
    }

    #[tokio::test]
    async fn manual_trigger_latches() {
        let shutdown = ShutdownSignal::from_stream(stream::pending::<&'static str>());
        shutdown.trigger("test");
        shutdown.trigger("test");
        assert!(shutdown.token().is_cancelled());
        assert_eq!(shutdown.shutdowns_initiated(), 1);
    }

    #[tokio::test]
    async fn install_registers_once_per_process() {
        let first = ShutdownSignal::install().unwrap();
        assert!(!first.is_shutting_down());
        assert!(matches!(ShutdownSignal::install(), Err(SignalError::AlreadyInstalled)));
    }
}
