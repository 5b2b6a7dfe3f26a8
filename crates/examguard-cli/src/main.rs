//! examguard CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examguard", version, about = "Proctored exam sessions and result delivery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate exam definition files
    Validate {
        /// Path to an exam .json file or a directory of them
        #[arg(long)]
        exam: PathBuf,
    },

    /// Re-score a set of answers against an exam
    Score {
        /// Exam definition JSON
        #[arg(long)]
        exam: PathBuf,

        /// Answers JSON: question id -> option letter
        #[arg(long)]
        answers: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Run a scripted exam session and submit the result
    Replay {
        /// Exam definition JSON
        #[arg(long)]
        exam: PathBuf,

        /// Session script JSON (student plus timed answers and signals)
        #[arg(long)]
        script: PathBuf,

        /// Also write the result document here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Retry delivery of results kept in local storage
    Resend {
        /// Only list pending results
        #[arg(long, conflicts_with = "file")]
        list: bool,

        /// Deliver a saved result document instead of the pending queue
        #[arg(long)]
        file: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example exam
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examguard=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { exam } => commands::validate::execute(exam),
        Commands::Score {
            exam,
            answers,
            format,
        } => commands::score::execute(exam, answers, format),
        Commands::Replay {
            exam,
            script,
            output,
            format,
            config,
        } => commands::replay::execute(exam, script, output, format, config).await,
        Commands::Resend { list, file, config } => {
            commands::resend::execute(list, file, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
