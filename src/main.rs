use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use vidshelf::media::extract::FfmpegExtractor;
use vidshelf::media::reconcile::Reconciler;
use vidshelf::media::thumbs::ThumbnailStore;
use vidshelf::{cli, config, http, net};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

async fn wait_for_shutdown() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    if SHUTTING_DOWN.swap(true, Ordering::SeqCst) {
        eprintln!("\nvidshelf: forced exit");
        std::process::exit(1);
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref()).and_then(|path| {
        match config::load_config(&path) {
            Ok(cfg) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    });

    let config = config::Config::resolve(file_config, &args);

    if !config.dir.is_dir() {
        fail(format_args!("not a readable directory: {}", config.dir.display()));
    }

    if let Err(e) = config.check_cache_dir() {
        fail(e);
    }

    let store = ThumbnailStore::open(&config.cache_dir)
        .unwrap_or_else(|e| fail(format_args!("cannot use thumbnail cache: {e}")));

    let extractor = FfmpegExtractor::new(&config.ffmpeg, config.extract_timeout);
    if !extractor.probe().await {
        tracing::warn!(
            "{} is not runnable; videos will be listed without thumbnails",
            config.ffmpeg.display()
        );
    }

    let reconciler = Arc::new(
        Reconciler::new(&config.dir, store, Arc::new(extractor)).with_jobs(config.extract_jobs),
    );

    tracing::info!("Serving videos from {}", config.dir.display());
    tracing::info!("Thumbnails cached in {}", config.cache_dir.display());

    // Warm the cache before the first page load; the directory may have
    // changed while the server was down.
    match reconciler.reconcile().await {
        Ok(pass) => tracing::info!(
            "{} videos, {} without thumbnail",
            pass.catalog.len(),
            pass.failed.len()
        ),
        Err(e) => fail(e),
    }

    let app = http::build_router(http::state::AppState {
        reconciler,
        port: config.port,
    });

    let listeners = if config.localhost {
        vec![bind(SocketAddr::from(([127, 0, 0, 1], config.port))).await]
    } else {
        bind_all_interfaces(config.port).await
    };

    let shown = if config.localhost {
        "127.0.0.1".to_string()
    } else {
        net::local_ip().to_string()
    };
    tracing::info!("Streaming live at http://{}:{}", shown, config.port);

    serve(listeners, app).await;
}

async fn bind(addr: SocketAddr) -> TcpListener {
    TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| fail(format_args!("failed to bind {addr}: {e}")))
}

/// Bind 0.0.0.0 and, where available, [::] as a separate IPv6-only socket.
/// Linux shares the stacks by default, which makes the second bind fail with
/// "Address already in use" unless IPV6_V6ONLY is set.
async fn bind_all_interfaces(port: u16) -> Vec<TcpListener> {
    let mut listeners = vec![bind(SocketAddr::from(([0, 0, 0, 0], port))).await];
    match bind_v6_only(port) {
        Ok(listener) => listeners.push(listener),
        Err(e) => tracing::warn!("IPv6 unavailable, serving IPv4 only: {}", e),
    }
    listeners
}

fn bind_v6_only(port: u16) -> std::io::Result<TcpListener> {
    use socket2::{Domain, Protocol, Socket, Type};

    let addr = SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    TcpListener::from_std(socket.into())
}

/// Serve `app` on every listener until the first Ctrl+C, then let in-flight
/// requests drain.
async fn serve(listeners: Vec<TcpListener>, app: Router) {
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let mut servers = tokio::task::JoinSet::new();
    for listener in listeners {
        let app = app.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        servers.spawn(async move {
            let addr = listener.local_addr().ok();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .unwrap_or_else(|e| tracing::error!("HTTP server error on {:?}: {}", addr, e));
        });
    }

    wait_for_shutdown().await;
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(());

    let drain = async { while servers.join_next().await.is_some() {} };
    if tokio::time::timeout(std::time::Duration::from_secs(5), drain).await.is_err() {
        tracing::warn!("Open connections did not close in time");
    }
    tracing::info!("Goodbye.");
}
