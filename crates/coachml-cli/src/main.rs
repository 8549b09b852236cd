//! coachml CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "coachml")]
#[command(about = "Interview answer analysis jobs", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "coachml.kdl")]
    config: String,

    /// Postgres queue URL; overrides the configured queue backend
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pool of analysis workers
    Worker {
        /// Number of workers; defaults to the configured count
        #[arg(long)]
        count: Option<usize>,
    },
    /// Submit an analysis job
    Submit {
        #[command(subcommand)]
        command: SubmitCommands,
    },
    /// Show the status of a job
    Status {
        /// Job ID
        id: String,
        /// Poll until the job reaches a terminal status
        #[arg(short, long)]
        wait: bool,
    },
}

#[derive(Subcommand)]
enum SubmitCommands {
    /// Full answer analysis: audio sentiment followed by answer synthesis
    Answer {
        /// URL of the recorded answer
        media_url: String,
    },
    /// Audio sentiment analysis only
    Audio {
        /// URL of the recorded answer
        media_url: String,
    },
    /// Text structure analysis
    Structure {
        /// Answer text
        text: String,
    },
    /// STAR method feedback
    Star {
        /// Answer text
        text: String,
    },
    /// Big Five personality feedback from trait scores
    BigFive {
        /// Openness, 0-100
        o: f64,
        /// Conscientiousness, 0-100
        c: f64,
        /// Extraversion, 0-100
        e: f64,
        /// Agreeableness, 0-100
        a: f64,
        /// Neuroticism, 0-100
        n: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let runtime = commands::Runtime::build(&cli.config, cli.database_url).await?;

    match cli.command {
        Commands::Worker { count } => {
            commands::worker(&runtime, count).await;
        }
        Commands::Submit { command } => match command {
            SubmitCommands::Answer { media_url } => {
                commands::submit_answer(&runtime, &media_url).await?;
            }
            SubmitCommands::Audio { media_url } => {
                commands::submit_audio(&runtime, &media_url).await?;
            }
            SubmitCommands::Structure { text } => {
                commands::submit_text(&runtime, coachml_core::TaskKind::TextStructure, text)
                    .await?;
            }
            SubmitCommands::Star { text } => {
                commands::submit_text(&runtime, coachml_core::TaskKind::StarFeedback, text)
                    .await?;
            }
            SubmitCommands::BigFive { o, c, e, a, n } => {
                commands::submit_big_five(&runtime, o, c, e, a, n).await?;
            }
        },
        Commands::Status { id, wait } => {
            commands::status(&runtime, &id, wait).await?;
        }
    }

    Ok(())
}
