use clap::{Parser, Subcommand};
use partwatch::config::{DbConfig, Thresholds};
use partwatch::inspector::PartitionInspector;
use partwatch::reporter::{ReportFormat, Reporter};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PostgreSQL partition topology inspector - assesses partition health and suggests maintenance
#[derive(Parser, Debug)]
#[command(name = "partwatch")]
#[command(version = "0.1.0")]
#[command(about = "PostgreSQL partition health analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "markdown")]
    format: ReportFormat,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze the partition hierarchies of a single PostgreSQL database
    Analyze {
        /// Database host
        #[arg(
            short = 'H',
            long = "host",
            env = "POSTGRES_HOST",
            default_value = "localhost"
        )]
        host: String,

        /// Database port
        #[arg(long = "port", env = "POSTGRES_PORT", default_value = "5432")]
        port: u16,

        /// Database name
        #[arg(short = 'd', long = "database", env = "POSTGRES_DATABASE")]
        database: String,

        /// Username
        #[arg(short = 'u', long = "username", env = "POSTGRES_USER")]
        username: String,

        /// Password
        #[arg(short = 'p', long = "password", env = "POSTGRES_PASSWORD")]
        password: String,

        /// Path to a YAML file overriding the advisory thresholds
        #[arg(long = "thresholds")]
        thresholds_path: Option<String>,
    },
    /// Analyze multiple databases from a YAML config file
    Config {
        /// Path to YAML config file
        #[arg(short = 'c', long = "config")]
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Analyze {
            host,
            port,
            database,
            username,
            password,
            thresholds_path,
        } => {
            info!("Analyzing database: {}", database);
            let thresholds = match thresholds_path {
                Some(path) => Thresholds::from_config_file(&path)?,
                None => Thresholds::default(),
            };
            let config = DbConfig::from_connection_params(
                host, port, database, username, password, thresholds,
            );

            let inspector = PartitionInspector::new(config).await?;
            let report = inspector.analyze().await?;

            let reporter = Reporter::new(cli.format);
            reporter.report(&report)?;
        }
        Commands::Config { config_path } => {
            info!("Loading config from: {}", config_path);
            let configs = DbConfig::from_config_file(&config_path)?;

            for config in configs {
                info!("Analyzing database: {}", config.database);
                let inspector = PartitionInspector::new(config).await?;
                let report = inspector.analyze().await?;

                let reporter = Reporter::new(cli.format);
                reporter.report(&report)?;
            }
        }
    }

    Ok(())
}
