use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ignition_kernel::jupyter::connection::{ConnectionInfo, KernelConfig, KernelInit};
use ignition_kernel::jupyter::kernel::{KernelParts, KernelShared, run_kernel};
use ignition_kernel::supervisor::Supervisor;
use ignition_kernel::web::{ApiState, router};

#[derive(Parser)]
#[command(name = "ignition-kernel")]
#[command(about = "A Jupyter kernel host with a REST control surface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kernel host: REST surface plus fleet supervisor
    Serve {
        /// Address for the REST control surface
        #[arg(long, default_value = "127.0.0.1:8089")]
        bind: SocketAddr,
        /// Mount the kernel routes under this base path
        #[arg(long, default_value = "/system/webdev/jupyter")]
        base_path: String,
    },
    /// Run a single kernel from an existing connection file
    Kernel {
        /// Path to the Jupyter connection file
        #[arg(long)]
        connection_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bind, base_path } => serve(bind, base_path).await,
        Commands::Kernel { connection_file } => run_single_kernel(&connection_file).await,
    }
}

async fn serve(bind: SocketAddr, base_path: String) -> Result<(), eyre::Report> {
    let supervisor = Arc::new(Supervisor::new());
    let state = Arc::new(ApiState {
        supervisor: supervisor.clone(),
        auth: None,
    });

    // second-line watchdog: a kernel wedged in user code cannot run its
    // own pulse check, so the supervisor sweeps for arrested kernels too
    let watchdog = supervisor.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(5));
        loop {
            tick.tick().await;
            watchdog.reap_arrested().await;
        }
    });

    let app = if base_path.is_empty() || base_path == "/" {
        router(state)
    } else {
        axum::Router::new().nest(&base_path, router(state))
    };

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .wrap_err_with(|| format!("cannot bind REST surface to {bind}"))?;
    info!(%bind, %base_path, "kernel host listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    supervisor.scram_all().await;
    Ok(())
}

async fn run_single_kernel(connection_file: &std::path::Path) -> Result<(), eyre::Report> {
    let info = ConnectionInfo::from_file(connection_file)
        .wrap_err("failed to load connection file")?;
    let config = KernelConfig::from_init(&KernelInit::from(&info));

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) =
        oneshot::channel::<Result<ConnectionInfo, String>>();
    let cancel = CancellationToken::new();
    let parts = KernelParts {
        shared: Arc::new(KernelShared::new()),
        interrupt: Arc::new(AtomicBool::new(false)),
        commands: command_rx,
        cancel: cancel.clone(),
    };

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_cancel.cancel();
    });

    // report readiness from the side; the kernel future itself is not Send
    // (its execution context is single-threaded by design), so it runs on
    // the root task
    let reporter = tokio::spawn(async move {
        match ready_rx.await {
            Ok(Ok(info)) => {
                info!(kernel_id = %info.ignition_kernel_id, "kernel ready");
                Ok(())
            }
            Ok(Err(message)) => Err(message),
            Err(_) => Err("kernel exited before becoming ready".to_string()),
        }
    });

    run_kernel(config, parts, ready_tx).await;
    drop(command_tx);

    match reporter.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(message)) => Err(eyre::eyre!("kernel failed to start: {message}")),
        Err(join_error) => Err(eyre::eyre!("readiness reporter failed: {join_error}")),
    }
}
