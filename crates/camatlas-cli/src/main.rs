//! camatlas — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use camatlas::{EngineConfig, OutputMode};
use camatlas_cli::cli::{extract_cmd, run_cmd, tile_cmd, RunOptions};

#[derive(Parser)]
#[command(
    name = "camatlas",
    about = "Resolve stream URLs, place and coordinates from live-camera listing pages",
    version
)]
struct Cli {
    /// Path to a JSON configuration file (also CAMATLAS_CONFIG).
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of URLs and merge records into per-country JSON files.
    Run {
        /// File containing one URL per line.
        #[arg(long, default_value = "url.txt")]
        urls: PathBuf,

        /// Directory of *.txt URL lists; preferred over --urls when it exists.
        #[arg(long, default_value = "cam_urls")]
        urls_dir: PathBuf,

        /// Directory receiving the per-country collections.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Record shape: minimal or full.
        #[arg(long)]
        mode: Option<OutputMode>,

        /// Pause between URLs in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Appended to the country name to form the file name.
        #[arg(long)]
        suffix: Option<String>,

        /// Per-request timeout in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },

    /// Extract one page and print every field with its provenance.
    Extract {
        /// A URL, or a path to a saved HTML file.
        source: String,

        /// Address a saved file was served from.
        #[arg(long)]
        url: Option<String>,

        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },

    /// Report whether a page looks client-rendered.
    Classify {
        /// A URL, or a path to a saved HTML file.
        source: String,

        #[arg(long)]
        url: Option<String>,

        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },

    /// Convert between slippy-map tiles and coordinates.
    Tile {
        /// Zoom level.
        #[arg(short, long)]
        zoom: u32,

        #[arg(short, long, requires = "y")]
        x: Option<u64>,

        #[arg(short, long, requires = "x")]
        y: Option<u64>,

        #[arg(long, requires = "lon", conflicts_with = "x", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   camatlas completions bash > ~/.local/share/bash-completion/completions/camatlas
    ///   camatlas completions zsh > ~/.zfunc/_camatlas
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Run {
            urls,
            urls_dir,
            out,
            mode,
            delay_ms,
            suffix,
            timeout_ms,
        } => {
            let config = EngineConfig::load(args.config.as_deref())?;
            let opts = RunOptions {
                urls_file: urls,
                urls_dir,
                out_dir: out,
                output_mode: mode,
                delay_ms,
                file_suffix: suffix,
                timeout_ms,
            };
            let stats = run_cmd::run(&config, &opts).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Extract {
            source,
            url,
            timeout_ms,
        } => {
            let config = EngineConfig::load(args.config.as_deref())?;
            let page = extract_cmd::load_source(&source, url.as_deref(), timeout_ms).await?;
            let report = extract_cmd::extract(&config, &page)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Classify {
            source,
            url,
            timeout_ms,
        } => {
            let config = EngineConfig::load(args.config.as_deref())?;
            let page = extract_cmd::load_source(&source, url.as_deref(), timeout_ms).await?;
            let assessment = extract_cmd::classify(&config, &page)?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }

        Commands::Tile {
            zoom,
            x,
            y,
            lat,
            lon,
        } => {
            let point = lat.zip(lon);
            let info = tile_cmd::run(zoom, x, y, point)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "camatlas", &mut std::io::stdout());
        }
    }

    Ok(())
}
