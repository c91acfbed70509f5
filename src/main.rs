use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use num_bigint::BigUint;
use tracing_subscriber::EnvFilter;

use qrshare::driver::{self, Parameters, DEFAULT_NUM_SHARES, DEFAULT_SECRET};
use qrshare::qr::{self, ErrorCorrection, QrOptions, SymbolVersion};

#[derive(Parser)]
#[command(name = "qrshare")]
#[command(about = "Split a secret into XOR shares stored as QR code images")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory share images are written to
    #[arg(long, global = true, env = "QRSHARE_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    #[command(flatten)]
    qr: QrArgs,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct QrArgs {
    /// QR error correction level
    #[arg(long, global = true, value_enum, default_value = "l")]
    ec_level: ErrorCorrection,

    /// Pixels per QR module
    #[arg(long, global = true, default_value_t = 10)]
    module_size: u32,

    /// Quiet zone width in modules
    #[arg(long, global = true, default_value_t = 4)]
    border: u32,

    /// Smallest QR symbol version to use
    #[arg(long, global = true, default_value_t = 3)]
    min_version: i16,

    /// Use exactly --min-version instead of growing to fit
    #[arg(long, global = true)]
    fixed_version: bool,
}

impl From<&QrArgs> for QrOptions {
    fn from(args: &QrArgs) -> Self {
        QrOptions {
            error_correction: args.ec_level,
            module_size: args.module_size,
            border: args.border,
            version: if args.fixed_version {
                SymbolVersion::Fixed(args.min_version)
            } else {
                SymbolVersion::AutoFit {
                    min: args.min_version,
                }
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Split, encode, decode, combine and verify (the default)
    Demo {
        #[arg(long, value_parser = parse_secret, default_value_t = BigUint::from(DEFAULT_SECRET))]
        secret: BigUint,
        #[arg(long, default_value_t = DEFAULT_NUM_SHARES)]
        shares: usize,
    },

    /// Write share images for a secret
    Split {
        #[arg(long, value_parser = parse_secret)]
        secret: BigUint,
        #[arg(long, default_value_t = DEFAULT_NUM_SHARES)]
        shares: usize,
    },

    /// Decode share images and recover the secret
    Combine {
        /// Share images; every share is required
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also render the recovered secret to this image
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// Same digits-only rule as decoded share payloads.
fn parse_secret(s: &str) -> Result<BigUint, String> {
    qr::parse_payload(s).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qrshare=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = QrOptions::from(&cli.qr);

    let command = cli.command.unwrap_or(Commands::Demo {
        secret: BigUint::from(DEFAULT_SECRET),
        shares: DEFAULT_NUM_SHARES,
    });

    match command {
        Commands::Demo { secret, shares } => {
            let params = Parameters {
                secret,
                num_shares: shares,
                out_dir: cli.out_dir,
                qr: options,
            };
            println!("Original Secret: {}", params.secret);
            let report = driver::run(&params).context("round trip failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Generated Shares: [{}]", report.shares.join(", "));
                println!("Combined Secret: {}", report.combined);
                if report.matched {
                    println!("Secrets match! Success.");
                } else {
                    println!("Secrets do not match. Something went wrong.");
                }
            }
            Ok(if report.matched {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Split { secret, shares } => {
            let written = driver::split_to_files(&secret, shares, &cli.out_dir, &options)
                .context("failed to write shares")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&written.paths)?);
            } else {
                for path in &written.paths {
                    println!("{}", path.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Combine { files, output } => {
            let secret = driver::combine_files(&files).context("failed to combine shares")?;
            if let Some(path) = &output {
                qr::encode_value(&secret, path, &options)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            if cli.json {
                println!("{}", serde_json::json!({ "secret": secret.to_string() }));
            } else {
                println!("Combined Secret: {}", secret);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
