//! ssv CLI - secret-keyed file envelopes
//!
//! Command-line interface for sealing files into SSV envelopes and opening
//! them again, using AES-256-CBC with PBKDF2 key stretching.

use clap::{ArgAction, Parser, Subcommand};
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use ssvbox::config::{self, Config};
use ssvbox::error::{ErrorCategory, ErrorKind, Result, SsvError};
use ssvbox::file_ops::{self, Destination};
use ssvbox::key::SecretKey;
use ssvbox::secret::{ReaderSecretReader, SecretReader, TerminalSecretReader};

#[derive(Parser)]
#[command(name = "ssv")]
#[command(version)]
#[command(about = "Seal files into secret-keyed envelopes and open them again.", long_about = None)]
struct Cli {
    /// Read the shared secret from stdin instead of SSV_SECRET_KEY or the terminal
    #[arg(long, global = true)]
    secret_stdin: bool,

    /// Log more (-v for info, -vv for debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a file into an envelope, recording its file name
    #[command(alias = "s")]
    Seal {
        /// Path to the file whose contents is to be sealed
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the envelope to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Open an envelope and print the original file name
    #[command(alias = "o")]
    Open {
        /// Path to the envelope
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the contents to
        #[arg(
            short,
            long,
            value_name = "FILE",
            conflicts_with = "output_dir",
            required_unless_present = "output_dir"
        )]
        output: Option<PathBuf>,

        /// Directory to write the contents into, under the original file name
        #[arg(short = 'd', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Replace an envelope's contents, while validating that the secret
    /// is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the file whose contents is to be sealed
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing envelope to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Show an envelope's header without opening it
    Inspect {
        /// Path to the envelope
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;

    match cli.command {
        Commands::Seal { input, output } => {
            let key = load_key(cli.secret_stdin, &config)?;
            file_ops::seal_file(&input, &output, &key, &config.limits)
        }
        Commands::Open {
            input,
            output,
            output_dir,
        } => {
            // clap requires exactly one of the two.
            let destination = output
                .map(Destination::File)
                .or(output_dir.map(Destination::Directory))
                .ok_or_else(|| {
                    SsvError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::Configuration,
                        "open needs --output or --output-dir",
                    )
                })?;
            let key = load_key(cli.secret_stdin, &config)?;
            let (filename, _) = file_ops::open_file(&input, &destination, &key, &config.limits)?;
            println!("{}", filename);
            Ok(())
        }
        Commands::Update { input, output } => {
            let key = load_key(cli.secret_stdin, &config)?;
            file_ops::update_file(&input, &output, &key, &config.limits)
        }
        Commands::Inspect { input } => {
            let header = file_ops::inspect_file(&input, &config.limits)?;
            println!("version: {}", header.version);
            println!("payload salt: {}", hex::encode(header.salt));
            println!("payload iv: {}", hex::encode(header.iv));
            println!("filename salt: {}", hex::encode(header.filename_salt));
            println!("filename iv: {}", hex::encode(header.filename_iv));
            println!(
                "filename ciphertext: {} bytes",
                header.filename_ciphertext_len
            );
            println!("payload ciphertext: {} bytes", header.payload_ciphertext_len);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "ssvbox=info",
        _ => "ssvbox=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Secret source precedence: --secret-stdin, then SSV_SECRET_KEY, then the terminal.
fn load_key(secret_stdin: bool, config: &Config) -> Result<SecretKey> {
    if !secret_stdin && config.has_secret() {
        return config.secret_key();
    }
    let mut reader = get_secret_reader(secret_stdin);
    let secret = reader.read_secret()?;
    config::secret_key_from(&secret)
}

fn get_secret_reader(use_stdin: bool) -> Box<dyn SecretReader> {
    if use_stdin {
        Box::new(ReaderSecretReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalSecretReader)
    }
}

/// Render an error and its sources as one line.
fn error_chain(err: &SsvError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
