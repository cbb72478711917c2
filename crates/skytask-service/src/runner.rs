//! Concurrent process runner with graceful shutdown.
//!
//! Named processes run until one fails or a SIGTERM/SIGINT arrives; the
//! cancellation token then stops the rest and closers run under a
//! timeout before the process exits.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running process driven by a cancellation token.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Cleanup function executed after every process has stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a named process. If any process returns an error, all others
    /// are cancelled and closers run.
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.processes.push((name.into(), process));
        self
    }

    /// Adds a cleanup function run after the processes stop, whatever the
    /// outcome. All closers attempt to execute even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Runs every process until completion, failure, or shutdown signal,
    /// then runs the closers and exits the application.
    pub async fn run(self) {
        let token = Arc::new(self.cancellation_token);
        let mut join_set = JoinSet::new();
        let closer_timeout = self.closer_timeout;
        let closers = self.closers;

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process((*process_token).clone()).await;
                (name, result)
            });
        }

        let signal_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received shutdown signal");
                    signal_token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "error setting up signal handler");
                }
            }
        });

        #[cfg(unix)]
        {
            let sigterm_token = token.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        info!("received SIGTERM signal");
                        sigterm_token.cancel();
                    }
                    Err(err) => {
                        error!(error = %err, "error setting up SIGTERM handler");
                    }
                }
            });
        }

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, error = format!("{err:#}"), "process failed");
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!(error = %err, "process panicked");
                    if !token.is_cancelled() {
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Let the remaining processes observe the cancellation.
        join_set.shutdown().await;

        if !closers.is_empty() {
            info!(timeout = ?closer_timeout, "running closers");
            match tokio::time::timeout(closer_timeout, run_closers(closers)).await {
                Ok(()) => info!("all closers completed"),
                Err(_) => error!(timeout = ?closer_timeout, "closers timed out"),
            }
        }

        if let Some(err) = first_error {
            error!(error = format!("{err:#}"), "exiting with error");
            std::process::exit(1);
        }
        info!("exiting normally");
        std::process::exit(0);
    }
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();

    for closer in closers {
        closer_set.spawn(async move { closer().await });
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("closer completed"),
            Ok(Err(err)) => error!(error = format!("{err:#}"), "closer error"),
            Err(err) => error!(error = %err, "closer panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_closers_all_execute() {
        let flag = Arc::new(AtomicBool::new(false));

        let runner = Runner::new().with_closer({
            let flag = flag.clone();
            move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        run_closers(runner.closers).await;
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_closer_does_not_block_others() {
        let flag = Arc::new(AtomicBool::new(false));

        let runner = Runner::new()
            .with_closer(|| async move { anyhow::bail!("cleanup failed") })
            .with_closer({
                let flag = flag.clone();
                move || async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            });

        run_closers(runner.closers).await;
        assert!(flag.load(Ordering::SeqCst));
    }
}
