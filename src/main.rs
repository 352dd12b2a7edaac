use clap::{Parser, Subcommand};
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use kagami::config::{Config, StorageConfig};
use kagami::error::ProxyError;
use kagami::metrics::Metrics;
use kagami::orchestrator::RequestOrchestrator;
use kagami::path::{TransformOption, TransformOptions};
use kagami::processor::ResizeProcessor;
use kagami::proxy::{KagamiProxy, Upstream};
use kagami::storage::{BlobStore, LocalStore, S3Store};

/// Kagami - on-demand image derivatives, built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the derivative URL for a source image
    Url {
        /// Source image path, e.g. cats/tom.jpg
        source: String,

        #[arg(long)]
        width: Option<f64>,

        #[arg(long)]
        height: Option<f64>,

        /// Transformation option such as `crop(10,20)` or `grayscale`
        #[arg(long = "option")]
        options: Vec<String>,
    },
}

fn main() {
    let args = Args::parse();

    // Load Kagami configuration from file
    let config = Config::from_file(&args.config)
        .and_then(|config| config.validate().map(|_| config))
        .unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(ProxyError::Config(e).exit_code());
        });

    if let Some(Command::Url {
        source,
        width,
        height,
        options,
    }) = &args.command
    {
        match encode_url(&config, source, *width, *height, options) {
            Ok(url) => println!("{}", url),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(e.exit_code());
            }
        }
        return;
    }

    if let Err(e) = kagami::logging::init_subscriber(config.logging.format) {
        eprintln!("Failed to initialize logging subsystem: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        paths = config.derivatives.paths.len(),
        signing_enabled = config.signer().is_enabled(),
        upstream = config.server.upstream.as_deref().unwrap_or("none"),
        "Configuration loaded successfully"
    );

    if args.test {
        tracing::info!("Configuration test passed");
        return;
    }

    if let Err(e) = run(args, config) {
        tracing::error!(error = %e, "Kagami failed to start");
        std::process::exit(e.exit_code());
    }
}

fn encode_url(
    config: &Config,
    source: &str,
    width: Option<f64>,
    height: Option<f64>,
    options: &[String],
) -> Result<String, ProxyError> {
    let options = options
        .iter()
        .map(|raw| raw.parse::<TransformOption>().map(|o| (o.name, o.args)))
        .collect::<Result<TransformOptions, _>>()
        .map_err(|e| ProxyError::Config(e.to_string()))?;
    let encoder = config.url_encoder().map_err(ProxyError::Config)?;
    encoder
        .encode(source, width, height, &options)
        .map_err(|e| ProxyError::Config(e.to_string()))
}

fn build_store(storage: &StorageConfig) -> Result<Arc<dyn BlobStore>, ProxyError> {
    match storage {
        StorageConfig::Local { root } => {
            let store = LocalStore::open(root)?;
            tracing::info!(root = ?store.local_root_path(), "Using local blob store");
            Ok(Arc::new(store))
        }
        StorageConfig::S3 { .. } => {
            let settings = storage
                .s3_settings()
                .ok_or_else(|| ProxyError::Config("incomplete s3 storage settings".to_string()))?;
            // The SDK client is built once, before Pingora starts its own runtimes
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ProxyError::Internal(format!("tokio runtime: {}", e)))?;
            let store = runtime.block_on(S3Store::connect(settings));
            tracing::info!(bucket = %store.bucket(), "Connected S3 blob store");
            Ok(Arc::new(store))
        }
    }
}

fn run(args: Args, config: Config) -> Result<(), ProxyError> {
    let store = build_store(&config.storage)?;
    let processor = Arc::new(ResizeProcessor::new(config.derivatives.max_source_pixels));
    let metrics = Arc::new(Metrics::new());
    let orchestrator = RequestOrchestrator::from_config(&config, store, processor, metrics)
        .map_err(ProxyError::Config)?;

    let upstream = config
        .server
        .upstream_addr()
        .transpose()
        .map_err(ProxyError::Config)?
        .map(|(host, port)| Upstream {
            host,
            port,
            tls: config.server.upstream_tls,
        });

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt))
        .map_err(|e| ProxyError::Internal(format!("Failed to create Pingora server: {}", e)))?;
    server.bootstrap();

    let proxy = KagamiProxy::new(Arc::new(orchestrator), upstream);
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);

    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting Kagami");

    server.add_service(proxy_service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
