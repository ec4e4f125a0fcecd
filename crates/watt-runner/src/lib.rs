//! Concurrent application runner for long-running processes with graceful
//! shutdown on SIGTERM/SIGINT, plus cleanup closers that always execute.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// An app process: receives a cancellation token and runs until done or
/// cancelled.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// A cleanup function executed after all processes stop.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Orchestrates named app processes: all run concurrently; the first failure
/// or a shutdown signal cancels the rest, then closers run under a timeout.
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

    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.processes.push((name.into(), process));
        self
    }

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

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until all processes finish or shutdown is requested, then execute
    /// closers and exit the process.
    pub async fn run(self) {
        let token = Arc::new(self.cancellation_token);
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process((*process_token).clone()).await;
                (name, result)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "app process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, "app process error: {:#}", err);
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!("app process panicked: {}", err);
                    if !token.is_cancelled() {
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        join_set.shutdown().await;

        if !self.closers.is_empty() {
            info!("running closers with timeout of {:?}", self.closer_timeout);
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => info!("all closers completed"),
                Err(_) => error!("closers timed out after {:?}", self.closer_timeout),
            }
        }

        if let Some(err) = first_error {
            error!("application exiting with error: {:#}", err);
            std::process::exit(1);
        } else {
            info!("application exiting normally");
            std::process::exit(0);
        }
    }
}

fn spawn_signal_handlers(token: Arc<CancellationToken>) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                error!("error setting up signal handler: {}", err);
            }
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("received SIGTERM");
                    token.cancel();
                }
                Err(err) => {
                    error!("error setting up SIGTERM handler: {}", err);
                }
            }
        });
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
            Ok(Err(err)) => error!("closer error: {:#}", err),
            Err(err) => error!("closer panicked: {}", err),
        }
    }
}
