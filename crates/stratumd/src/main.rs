//! stratumd — the object-storage daemon (§4.8): serves one TCP connection
//! per client, dispatching wire requests to the configured object/KV back
//! ends, with a side admin HTTP surface from `stratum-api`.

mod dispatch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{signal, SignalKind};

use stratum_backend::{load_kv_backend, load_object_backend};
use stratum_core::config::StratumConfig;
use stratum_core::wire::{self};

use dispatch::Dispatcher;

struct Args {
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    admin_port: u16,
    daemon: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config_path: None,
        port: None,
        admin_port: 4712,
        daemon: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--config" => args.config_path = it.next().map(std::path::PathBuf::from),
            "--port" => {
                args.port = it.next().and_then(|v| v.parse().ok());
            }
            "--admin-port" => {
                args.admin_port = it.next().and_then(|v| v.parse().ok()).unwrap_or(4712);
            }
            "--daemon" => args.daemon = true,
            other => {
                eprintln!("stratumd: ignoring unrecognized argument {other}");
            }
        }
    }
    args
}

/// Detach from the controlling terminal: a double fork (so the daemon is
/// re-parented to init and can never reacquire a controlling terminal),
/// `setsid`, `chdir("/")`, and stdio redirected to `/dev/null`. Must run
/// before the Tokio runtime is built — forking a multi-threaded runtime is
/// not supported.
fn daemonize() -> Result<()> {
    unsafe {
        match libc::fork() {
            -1 => anyhow::bail!("first fork failed: {}", std::io::Error::last_os_error()),
            0 => {}
            _ => std::process::exit(0),
        }

        if libc::setsid() == -1 {
            anyhow::bail!("setsid failed: {}", std::io::Error::last_os_error());
        }

        match libc::fork() {
            -1 => anyhow::bail!("second fork failed: {}", std::io::Error::last_os_error()),
            0 => {}
            _ => std::process::exit(0),
        }

        std::env::set_current_dir("/").context("chdir(\"/\") failed")?;
        libc::umask(0);

        let devnull = std::ffi::CString::new("/dev/null").unwrap();
        let fd = libc::open(devnull.as_ptr(), libc::O_RDWR);
        if fd == -1 {
            anyhow::bail!("open(/dev/null) failed: {}", std::io::Error::last_os_error());
        }
        libc::dup2(fd, libc::STDIN_FILENO);
        libc::dup2(fd, libc::STDOUT_FILENO);
        libc::dup2(fd, libc::STDERR_FILENO);
        if fd > 2 {
            libc::close(fd);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();

    // The fork must happen before any Tokio runtime (and its thread pool)
    // exists, so this runs on a plain, not-yet-async `main`.
    if args.daemon {
        daemonize()?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start the Tokio runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    if let Some(path) = &args.config_path {
        // SAFETY: single-threaded at this point in startup, before any task
        // that might read STRATUM_CONFIG concurrently has been spawned.
        unsafe {
            std::env::set_var("STRATUM_CONFIG", path);
        }
    }
    let mut config = StratumConfig::load()?;
    if let Some(port) = args.port {
        config.servers = vec![stratum_core::config::ServerAddr {
            host: "0.0.0.0".to_string(),
            port,
        }];
    }
    let port = config
        .servers
        .first()
        .map(|s| s.port)
        .unwrap_or(4711);

    let object_backend = load_object_backend(&config.object_backend.module, &config.object_backend.path)?;
    let kv_backend = load_kv_backend(&config.kv_backend.module, &config.kv_backend.path)?;
    let dispatcher = Arc::new(Dispatcher::new(object_backend, kv_backend));

    let admin_state = stratum_api::ApiState {
        stats: dispatcher.stats.clone(),
        object_backend_module: config.object_backend.module.clone(),
        kv_backend_module: config.kv_backend.module.clone(),
        started_at: std::time::Instant::now(),
    };
    let admin_port = args.admin_port;
    tokio::spawn(async move {
        if let Err(e) = stratum_api::serve(admin_state, admin_port).await {
            tracing::error!(error = %e, "admin HTTP surface exited");
        }
    });

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, admin_port, "stratumd listening");

    let mut sighup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        tracing::warn!(%peer, error = %e, "connection ended");
                    }
                });
            }
            _ = sighup.recv() => {
                tracing::info!("received SIGHUP, shutting down");
                return Ok(());
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                return Ok(());
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, dispatcher: Arc<Dispatcher>) -> Result<()> {
    loop {
        let request = match wire::read_frame(&mut stream).await {
            Ok(request) => request,
            Err(stratum_core::wire::WireError::Io(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let reply = dispatcher.handle(request);
        wire::write_frame(&mut stream, &reply).await?;
    }
}
