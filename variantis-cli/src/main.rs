use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use variantis_core::PsaProgram;

mod commands;
mod config;
mod error;

use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "variantis")]
#[command(about = "Variantis - pairwise alignment and substitution analysis")]
#[command(version)]
#[command(long_about = "
Variantis aligns every pair of submitted nucleotide sequences with EMBOSS
needle or stretcher and reports transitions, transversions, gaps and
substitution matrices per pair.

Examples:
  variantis start --client 10.0.0.7
  variantis submit <SESSION> --file sequences.fasta --program needle
  variantis run <SESSION>
  variantis pair <SESSION> query001 query002
  variantis download <SESSION> transratio.xlsx --out ./reports
  variantis daemon
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use for aligning pairs
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a session; prints its token
    Start {
        /// Client address recorded with the session
        #[arg(long, default_value = "127.0.0.1")]
        client: String,
    },

    /// Submit sequences to a session
    Submit {
        /// Session token
        session: String,

        /// FASTA file to upload ("-" reads pasted text from stdin)
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// FASTA text given inline
        #[arg(long)]
        text: Option<String>,

        /// Alignment program
        #[arg(long)]
        program: Option<ProgramArg>,

        /// Gap opening penalty
        #[arg(long)]
        gap_open: Option<f64>,

        /// Gap extension penalty
        #[arg(long)]
        gap_extend: Option<f64>,
    },

    /// Align all pairs and classify substitutions
    Run {
        /// Session token
        session: String,
    },

    /// Show one aligned pair column by column
    Pair {
        /// Session token
        session: String,

        /// Query id (e.g. query001)
        query: String,

        /// Subject id (e.g. query002)
        subject: String,

        /// Columns per line
        #[arg(long, default_value = "50")]
        width: usize,
    },

    /// Show the parameters of the session's alignment
    Details {
        /// Session token
        session: String,
    },

    /// Show which query id stands for which submitted sequence
    Mapping {
        /// Session token
        session: String,
    },

    /// Fetch a result file
    Download {
        /// Session token
        session: String,

        /// Public file name (nucleotide.xlsx, transratio.xlsx, user_alignment.fasta,
        /// summary_features.xlsx, summary_alignment.xlsx)
        name: String,

        /// Copy the file here instead of printing its location
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// End a session and delete its files
    End {
        /// Session token
        session: String,
    },

    /// List stored sessions
    Sessions,

    /// Reclaim idle, stale and orphaned sessions once
    Sweep,

    /// Sweep on the configured interval until interrupted
    Daemon,

    /// Show or write the configuration
    Config {
        /// Print the default configuration
        #[arg(long)]
        example: bool,

        /// Write the effective configuration to this file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ProgramArg {
    Needle,
    Stretcher,
}

impl From<ProgramArg> for PsaProgram {
    fn from(program: ProgramArg) -> Self {
        match program {
            ProgramArg::Needle => PsaProgram::Needle,
            ProgramArg::Stretcher => PsaProgram::Stretcher,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let threads = cli.threads.unwrap_or(config.alignment.threads).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to set thread count")?;
    log::debug!("Using {} worker threads", threads);

    let json = cli.json;
    match cli.command {
        Commands::Start { client } => commands::session::start(&config, &client, json)?,
        Commands::Submit { session, file, text, program, gap_open, gap_extend } => {
            commands::submit::execute(
                &config,
                commands::submit::SubmitArgs { session, file, text, program, gap_open, gap_extend },
                json,
            )?
        }
        Commands::Run { session } => commands::results::run(&config, &session, json)?,
        Commands::Pair { session, query, subject, width } => {
            commands::results::pair(&config, &session, &query, &subject, width, json)?
        }
        Commands::Details { session } => commands::results::details(&config, &session, json)?,
        Commands::Mapping { session } => commands::results::mapping(&config, &session, json)?,
        Commands::Download { session, name, out } => commands::results::download(&config, &session, &name, out)?,
        Commands::End { session } => commands::session::end(&config, &session)?,
        Commands::Sessions => commands::session::list(&config, json)?,
        Commands::Sweep => commands::sweep::once(&config, json)?,
        Commands::Daemon => commands::sweep::daemon(&config)?,
        Commands::Config { example, write } => {
            if example {
                print!("{}", Config::example_toml()?);
            } else {
                print!("{}", toml::to_string_pretty(&config).context("Failed to serialize configuration")?);
            }
            if let Some(path) = write {
                config.save_to_file(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<CliError>() {
            Some(cli_err) => print_error_and_exit(cli_err),
            None => {
                eprintln!("Error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}
