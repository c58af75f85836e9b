use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geocoder::geocoding::{AutocompleteErrorPolicy, ClientConfig, GeocodingClient, DEFAULT_AUTOCOMPLETE_LIMIT};
use serde::Serialize;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Geocoder: address lookup against a LocationIQ-style provider
///
/// Reads LOCATIONIQ_API_KEY (and optional GEOCODER_* overrides) from the
/// environment or a .env file.
///
/// Examples:
///   geocoder geocode "350 5th Ave, New York"
///   geocoder reverse --lat 59.3293 --lon 18.0686
///   geocoder autocomplete "Colos" --limit 3
///   geocoder serve --port 3000
#[derive(Parser)]
#[command(name = "geocoder", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the provider base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a free-text address to coordinates.
    Geocode {
        address: String,
    },

    /// Resolve coordinates to an address.
    Reverse {
        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Suggest places for a partial query.
    Autocomplete {
        query: String,

        /// Maximum suggestions (capped at 10).
        #[arg(long, short = 'l', default_value_t = DEFAULT_AUTOCOMPLETE_LIMIT)]
        limit: usize,

        /// Fail on provider errors instead of printing an empty list.
        #[arg(long)]
        strict: bool,
    },

    /// Serve the lookups as a JSON HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, short = 'p', default_value_t = 3000)]
        port: u16,
    },
}

fn load_env() {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() {
    load_env();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base) = cli.base_url {
        config.base_url = base;
    }
    if let Command::Autocomplete { strict: true, .. } = cli.command {
        config.autocomplete_errors = AutocompleteErrorPolicy::Raise;
    }
    debug!(base_url = %config.base_url, timeout = ?config.timeout, "client configured");

    let client = GeocodingClient::new(config)?;

    match cli.command {
        Command::Geocode { address } => print_json(&client.geocode_address(&address)?),
        Command::Reverse { lat, lon } => print_json(&client.reverse_geocode(lat, lon)?),
        Command::Autocomplete { query, limit, .. } => {
            print_json(&client.address_autocomplete(&query, limit)?)
        }
        Command::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime
                .block_on(geocoder::server::start(client, &host, port))
                .with_context(|| format!("server on {}:{} failed", host, port))
        }
    }
}
