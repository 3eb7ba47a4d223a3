//! WordPress Preflight CLI - gate a WordPress target before scanning

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use wordpress_preflight::{
    CliSink, FileDb, Format, Gate, HttpUpdater, JsonSink, Outcome, ParsedOptions, ServerKind,
    StdinPrompt, default_client,
};

/// Pre-scan gate for WordPress security scanning
#[derive(Parser, Debug)]
#[command(name = "wordpress-preflight")]
#[command(version, about, long_about = None)]
struct Args {
    /// URL of the site to gate (may be omitted only with --update)
    #[arg(required_unless_present = "update")]
    url: Option<String>,

    /// Server family override (skips probing the target)
    #[arg(long = "server", value_enum, ignore_case = true)]
    server: Option<ServerArg>,

    /// Proceed even if the target does not look like WordPress
    #[arg(long = "force")]
    force: bool,

    /// Update the vulnerability database before scanning
    #[arg(long = "update", overrides_with = "no_update")]
    update: bool,

    /// Never update the vulnerability database
    #[arg(long = "no-update", overrides_with = "update")]
    no_update: bool,

    /// Output format
    #[arg(short = 'o', long = "format", default_value = "cli", value_enum)]
    format: FormatArg,

    /// Verbose diagnostics
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Directory holding the vulnerability database
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,
}

/// Server family argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ServerArg {
    Apache,
    Iis,
    Nginx,
}

impl From<ServerArg> for ServerKind {
    fn from(arg: ServerArg) -> Self {
        match arg {
            ServerArg::Apache => ServerKind::Apache,
            ServerArg::Iis => ServerKind::Iis,
            ServerArg::Nginx => ServerKind::Nginx,
        }
    }
}

/// Output format argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Cli,
    Json,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Cli => Format::Cli,
            FormatArg::Json => Format::Json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "wordpress_preflight=debug"
    } else {
        "wordpress_preflight=info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> wordpress_preflight::Result<()> {
    let update = if args.update {
        Some(true)
    } else if args.no_update {
        Some(false)
    } else {
        None
    };

    let mut builder = ParsedOptions::builder()
        .force(args.force)
        .update(update)
        .format(args.format.into())
        .verbose(args.verbose);
    if let Some(url) = &args.url {
        builder = builder.url(url);
    }
    if let Some(server) = args.server {
        builder = builder.server(server.into());
    }
    if let Some(dir) = args.data_dir {
        builder = builder.data_dir(dir);
    }
    let options = builder.build()?;

    let client = default_client()?;
    let db = FileDb::new(options.data_dir.clone());
    let updater = HttpUpdater::new(client.clone(), options.data_dir.clone());
    let format = options.format;

    let outcome = match format {
        Format::Cli => {
            let sink = CliSink::new(std::io::stdout());
            let mut gate = Gate::new(options, db, updater, sink, StdinPrompt)?.with_client(client);
            gate.before_scan().await?
        }
        Format::Json => {
            let sink = JsonSink::new(std::io::stdout());
            let mut gate = Gate::new(options, db, updater, sink, StdinPrompt)?.with_client(client);
            gate.before_scan().await?
        }
    };

    if let Outcome::ReadyToScan(target) = outcome
        && format == Format::Cli
    {
        println!("[+] {} passed all pre-scan checks", target.url());
    }

    Ok(())
}
