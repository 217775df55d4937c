use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use slate_core::{BuildStats, Context, FileEvent, SyncMode};
use slate_sync::RemoteStore;

use crate::bundler::{self, Bundler};
use crate::coordinator::{Dispatcher, SyncCoordinator};
use crate::error::{io_err, WatchError};
use crate::paths::client_script_url;
use crate::reload::{ReloadHub, ReloadServer};
use crate::watcher::{self, watch_tree};

type TaskHandle = JoinHandle<Result<(), WatchError>>;

/// Everything a watch session needs before it starts.
pub struct WatchSession {
    ctx: Arc<Context>,
    store: Arc<dyn RemoteStore>,
    bundler: Option<Bundler>,
    hub: ReloadHub,
}

impl WatchSession {
    pub fn new(ctx: Arc<Context>, store: Arc<dyn RemoteStore>) -> Self {
        let bundler = Bundler::from_context(&ctx);
        Self {
            ctx,
            store,
            bundler,
            hub: ReloadHub::new(),
        }
    }

    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Acquire every handle (watchers, reload listener, bundler child) and
    /// spawn the session tasks. Any acquisition failure is returned before a
    /// single task runs. Sending on `shutdown_tx` stops the session.
    pub async fn start(self, shutdown_tx: broadcast::Sender<()>) -> Result<RunningSession, WatchError> {
        let ctx = self.ctx;
        fs::create_dir_all(&ctx.dest_root).map_err(|e| io_err(&ctx.dest_root, e))?;

        let (source_watcher, source_rx) = watch_tree(&ctx.source_root)?;
        let (output_watcher, output_rx) = watch_tree(&ctx.dest_root)?;
        let server = ReloadServer::bind(ctx.reload.port, self.hub.clone()).await?;
        let reload_addr = server.local_addr();

        let bundler = match self.bundler {
            Some(bundler) => {
                let child = bundler.spawn_watch()?;
                Some((bundler, child))
            }
            None => {
                tracing::info!("no js configured; build stage disabled");
                None
            }
        };

        tracing::info!(
            source = %ctx.source_root.display(),
            output = %ctx.dest_root.display(),
            store = %self.store.describe(),
            reload = %client_script_url(reload_addr),
            "watching"
        );
        if ctx.mode == SyncMode::LocalOnly {
            tracing::warn!("local-only mode: changes are mirrored but not uploaded");
        }

        let (bus_tx, bus_rx) = mpsc::unbounded_channel::<FileEvent>();
        let mut handles: Vec<(&'static str, TaskHandle)> = Vec::new();

        let source_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let result =
                    watcher::source_task(ctx, source_watcher, source_rx, shutdown_rx).await;
                let _ = shutdown.send(());
                result
            })
        };
        handles.push(("source_watcher", source_handle));

        let output_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let ctx = ctx.clone();
            let bus_tx = bus_tx.clone();
            tokio::spawn(async move {
                let result =
                    watcher::output_task(ctx, output_watcher, output_rx, bus_tx, shutdown_rx).await;
                let _ = shutdown.send(());
                result
            })
        };
        handles.push(("output_watcher", output_handle));

        let dispatcher_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let coordinator = SyncCoordinator::new(self.store.clone(), Arc::new(self.hub.clone()));
            tokio::spawn(async move {
                Dispatcher::new(coordinator).run(bus_rx, shutdown_rx).await;
                let _ = shutdown.send(());
                Ok(())
            })
        };
        handles.push(("sync_dispatcher", dispatcher_handle));

        if let Some((bundler, child)) = bundler {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let ctx = ctx.clone();
            let bus_tx = bus_tx.clone();
            let handle = tokio::spawn(async move {
                let result = bundler::watch_task(bundler, ctx, child, bus_tx, shutdown_rx).await;
                let _ = shutdown.send(());
                result
            });
            handles.push(("bundler", handle));
        }
        drop(bus_tx);

        let reload_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                let result = server.serve(shutdown.clone(), shutdown_rx).await;
                let _ = shutdown.send(());
                result
            })
        };
        handles.push(("reload_server", reload_handle));

        Ok(RunningSession {
            handles,
            reload_addr,
        })
    }
}

/// Handles of a started session.
pub struct RunningSession {
    handles: Vec<(&'static str, TaskHandle)>,
    reload_addr: SocketAddr,
}

impl RunningSession {
    pub fn reload_addr(&self) -> SocketAddr {
        self.reload_addr
    }

    /// Wait for every task to exit. The first task error is returned after
    /// all of them have stopped.
    pub async fn wait(self) -> Result<(), WatchError> {
        let mut first_err = None;
        for (task, handle) in self.handles {
            if let Err(err) = handle_join(task, handle.await) {
                tracing::error!(task, error = %err, "session task failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => {
                tracing::info!("watch session stopped");
                Ok(())
            }
        }
    }
}

/// Run a session until ctrl-c or until `shutdown_tx` fires.
pub async fn run(session: WatchSession, shutdown_tx: broadcast::Sender<()>) -> Result<(), WatchError> {
    let running = session.start(shutdown_tx.clone()).await?;

    let signal_handle: TaskHandle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, stopping watch session");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(WatchError::Task(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let session_result = running.wait().await;
    // Session tasks may all end on their own; make sure the signal task does too.
    let _ = shutdown_tx.send(());
    handle_join("signal_handler", signal_handle.await)?;
    session_result
}

/// Run a watch session on a fresh runtime and block until it ends.
///
/// Remote calls still in flight when the session stops are abandoned, not
/// drained.
pub fn watch_blocking(ctx: Context, store: Arc<dyn RemoteStore>) -> Result<(), WatchError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    let result = runtime.block_on(async move {
        let (shutdown_tx, _) = broadcast::channel::<()>(16);
        run(WatchSession::new(Arc::new(ctx), store), shutdown_tx).await
    });
    runtime.shutdown_background();
    result
}

/// Run the bundler once on a fresh runtime.
pub fn build_blocking(ctx: &Context) -> Result<BuildStats, WatchError> {
    let bundler = Bundler::from_context(ctx).ok_or(WatchError::NoBundler)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(bundler.build())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), WatchError>, tokio::task::JoinError>,
) -> Result<(), WatchError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(WatchError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the `RUST_LOG`-driven subscriber (default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
