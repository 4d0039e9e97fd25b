use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use mediassist::chat::{ChatSession, HttpChatTransport, SendError, StreamLimits};
use mediassist::config::{load_config, AppConfig};
use mediassist::observability::init_tracing;
use mediassist::routing::{dispatch_request, normalize_base_path};
use mediassist::state::AppState;
use mediassist::transcript::{Role, Transcript, TranscriptObserver};
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

enum Command {
    Serve,
    Chat,
}

fn main() {
    let mut args = std::env::args().skip(1);
    let command = match args.next().as_deref() {
        None | Some("serve") => Command::Serve,
        Some("chat") => Command::Chat,
        Some(other) => {
            eprintln!("Unknown command '{other}'");
            eprintln!("Usage: mediassist [serve|chat] [config.yaml]");
            std::process::exit(2);
        }
    };
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);
    let runtime = build_runtime(&config);

    runtime.block_on(async move {
        match command {
            Command::Serve => serve(config).await,
            Command::Chat => chat(config).await,
        }
    });
}

fn build_runtime(config: &AppConfig) -> tokio::runtime::Runtime {
    let worker_threads = config.server.runtime_worker_threads;
    let mut runtime_builder = if worker_threads == Some(1) {
        tokio::runtime::Builder::new_current_thread()
    } else {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        builder
    };
    runtime_builder.enable_io();
    runtime_builder.enable_time();
    runtime_builder.build().unwrap_or_else(|e| {
        eprintln!("Failed to initialize Tokio runtime: {e}");
        std::process::exit(1);
    })
}

async fn serve(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;
    let base_path = normalize_base_path(&config.server.base_path);

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            eprintln!("Failed to initialize relay: {err}");
            std::process::exit(1);
        }
    };
    if state.config.upstream.resolve_api_key().is_none() {
        tracing::warn!(
            "no upstream API key configured; chat requests will fail until {} is set",
            state.config.upstream.api_key_env
        );
    }
    let dispatch_base_path = Arc::<str>::from(base_path.clone());

    tracing::info!(
        "mediassist relay starting on {}:{} with base_path='{}'",
        host,
        port,
        base_path
    );

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!("mediassist relay is ready to accept connections");
    serve_accept_loop(
        listener,
        AutoBuilder::new(TokioExecutor::new()),
        state,
        dispatch_base_path,
    )
    .await;
}

async fn serve_accept_loop(
    listener: tokio::net::TcpListener,
    conn_builder: AutoBuilder<TokioExecutor>,
    dispatch_state: Arc<AppState>,
    dispatch_base_path: Arc<str>,
) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                tracing::warn!("accept error: {err}");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to enable TCP_NODELAY for {remote_addr}: {err}");
        }

        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let request_state = Arc::clone(&dispatch_state);
        let request_base_path = Arc::clone(&dispatch_base_path);
        let hyper_service = service_fn(move |request: Request<Incoming>| {
            dispatch_request(
                Arc::clone(&request_state),
                Arc::clone(&request_base_path),
                request.map(Body::new),
            )
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, hyper_service).await {
                tracing::debug!("failed to serve connection from {remote_addr}: {err:#}");
            }
        });
    }
}

/// Prints the assistant turn as it grows.
#[derive(Default)]
struct TerminalEcho {
    printed: usize,
}

impl TranscriptObserver for TerminalEcho {
    fn publish(&mut self, transcript: &Transcript) {
        let Some(turn) = transcript.in_progress_turn() else {
            return;
        };
        if turn.role != Role::Assistant {
            return;
        }
        if let Some(suffix) = turn.content.get(self.printed..) {
            if !suffix.is_empty() {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(suffix.as_bytes());
                let _ = stdout.flush();
            }
        }
        self.printed = turn.content.len();
    }
}

async fn chat(config: AppConfig) {
    let transport = HttpChatTransport::new(&config.client).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(1);
    });
    tracing::info!("chatting with {}", transport.chat_url());
    let session = ChatSession::with_limits(
        transport,
        StreamLimits {
            max_buffered_bytes: config.client.max_buffered_bytes,
        },
    );

    println!("MediAssist - describe your symptoms (Ctrl-D to quit).");
    println!("This assistant provides general information only and is not a substitute for professional medical advice.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("Failed to read input: {err}");
                break;
            }
        };

        let mut echo = TerminalEcho::default();
        match session.send(&line, &mut echo).await {
            Ok(outcome) => {
                println!();
                if let Some(class) = outcome.error() {
                    let notice = class.notice();
                    eprintln!("[{}] {}", notice.title, notice.description);
                }
            }
            Err(SendError::EmptyMessage) => {}
            Err(err) => eprintln!("{err}"),
        }
    }
}
