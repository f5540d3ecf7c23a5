use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use time::UtcOffset;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use concron_api::HealthApi;
use concron_core::{AllowedTasks, Scheduler, load_tasks};
use concron_observe::{LoggerConfig, LoggerFormat, init_logger};

/// How long shutdown waits for killed executions to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Cron-like scheduler running shell jobs under per-task concurrency policies.
#[derive(Parser, Debug)]
#[command(name = "concron")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    ALLOWED_TASKS   Comma-separated task names to load (all when unset)")]
struct Args {
    /// Port for the /healthz endpoint
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Task document
    #[arg(short, long, default_value = "tasks.yaml")]
    config: PathBuf,

    /// Log output format: text or json
    #[arg(long, default_value = "text")]
    log_format: LoggerFormat,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // log timestamps: the local offset is only readable while the process is single-threaded
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    init_logger(&LoggerConfig::daemon(args.debug, args.log_format, Some(offset)))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot build tokio runtime")?
        .block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let tasks = load_tasks(&args.config, &AllowedTasks::from_env())
        .with_context(|| format!("cannot load tasks from {}", args.config.display()))?;

    let scheduler = Scheduler::new();
    scheduler.add_tasks(tasks)?;
    scheduler.start()?;

    let shutdown = CancellationToken::new();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let mut server = tokio::spawn(concron_api::serve(
        addr,
        HealthApi::new().router(),
        shutdown.clone(),
    ));

    info!(port = args.port, "agent is running; press Ctrl+C to stop");

    // the server only returns on its own when it failed
    let server_exit = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("cannot listen for ctrl-c")?;
            info!("shutting down");
            None
        }
        res = &mut server => Some(res),
    };

    scheduler.stop()?;
    let killed = scheduler.kill_running();
    if killed > 0 {
        info!(killed, "running executions killed");
        let until = tokio::time::Instant::now() + KILL_GRACE;
        while scheduler.running() > 0 && tokio::time::Instant::now() < until {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if scheduler.running() > 0 {
            warn!(running = scheduler.running(), "executions still running at exit");
        }
    }
    shutdown.cancel();

    let res = match server_exit {
        Some(res) => res,
        None => server.await,
    };
    res.context("http server task panicked")??;
    Ok(())
}
