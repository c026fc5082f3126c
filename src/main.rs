use anyhow::Result;
use clap::{Parser, Subcommand};
use mirrorctl::{ActionOutcome, MirrorApp, MirrorConfig, ServiceAction};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mirrorctl")]
#[command(about = "Control daemon for a screen-mirroring relay service")]
#[command(version)]
#[command(long_about = "Discovers attached mirroring devices, starts and stops the relay \
service through its init script, tracks whether it is running and serves a small JSON API \
that a browser can poll.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mirrorctl.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the control API (default)
    Serve,
    /// Probe the relay service once
    Status,
    /// List attached devices
    Devices,
    /// Start the relay service and enable it at boot
    Start,
    /// Stop the relay service and disable it at boot
    Stop,
    /// Restart the relay service
    Restart,
    /// Print the relay log, newest first
    Log,
    /// Truncate the relay log
    ClearLog,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", MirrorConfig::default().to_toml()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting mirrorctl v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match MirrorConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let app = MirrorApp::new(config)?;

    let exit_code = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&app).await?,
        Command::Status => {
            let snapshot = app.surface().refresh_status().await;
            if snapshot.probe_failed {
                println!("● {} (status could not be determined)", snapshot.label);
            } else {
                println!("● {}", snapshot.label);
            }
            if snapshot.state.is_running() {
                0
            } else {
                3
            }
        }
        Command::Devices => match app.surface().refresh_devices().await {
            Ok(options) => {
                for device in &options.devices {
                    println!("{}", device);
                }
                0
            }
            Err(e) => {
                eprintln!("✗ {}", e);
                1
            }
        },
        Command::Start => run_action(&app, ServiceAction::Start).await,
        Command::Stop => run_action(&app, ServiceAction::Stop).await,
        Command::Restart => run_action(&app, ServiceAction::Restart).await,
        Command::Log => {
            println!("{}", app.log().read_reversed().await);
            0
        }
        Command::ClearLog => match app.log().clear().await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("✗ {}", e);
                1
            }
        },
    };

    std::process::exit(exit_code);
}

#[cfg(feature = "http")]
async fn serve(app: &MirrorApp) -> Result<i32> {
    Ok(app.run().await?)
}

#[cfg(not(feature = "http"))]
async fn serve(_app: &MirrorApp) -> Result<i32> {
    anyhow::bail!("mirrorctl was built without the http feature")
}

async fn run_action(app: &MirrorApp, action: ServiceAction) -> i32 {
    match app.surface().perform_action(action).await {
        ActionOutcome::Completed => {
            println!("✓ Relay service {}", action.past_tense());
            0
        }
        ActionOutcome::Failed(e) => {
            eprintln!("✗ {}", e);
            1
        }
        ActionOutcome::Busy => {
            eprintln!("✗ {} already in progress", action);
            1
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mirrorctl={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .with_writer(std::io::stderr)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}
