use clap::{Parser, Subcommand};
use match_rag::Result;
use match_rag::collector::{CollectOptions, RoundRange};
use match_rag::commands::{clean_tree, collect_season, delete, embed_directory, parse_filter, search};
use match_rag::config::{load_config, show_config, write_config};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "match-rag")]
#[command(about = "Collects football match data and indexes player performances for similarity search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the configuration file, or show it
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Collect every match of a season into one JSON file per match
    Collect {
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        /// Season year, e.g. 2024
        #[arg(long)]
        season_year: i32,
        /// Use this season id instead of resolving it from the year
        #[arg(long)]
        season_id: Option<u64>,
        /// Tournament id; defaults to the configured one
        #[arg(long)]
        tournament_id: Option<u64>,
        /// Inclusive round range, `a-b` or a single round
        #[arg(long)]
        rounds: Option<RoundRange>,
        /// Events per logged batch
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
    },
    /// Strip redundant keys from collected files into a mirrored directory
    Clean {
        /// Directory holding the season directories
        #[arg(long)]
        base: PathBuf,
        /// Output root for cleaned copies
        #[arg(long)]
        out: PathBuf,
        /// Season directories to clean; defaults to the configured ones
        #[arg(long = "season")]
        seasons: Vec<String>,
    },
    /// Embed player performances from every match file in a directory
    Embed {
        /// Directory of collected (or cleaned) match files
        dir: PathBuf,
    },
    /// Search stored player performances
    Search {
        query: String,
        /// Number of results
        #[arg(short)]
        k: Option<usize>,
        /// Minimum cosine similarity
        #[arg(long)]
        min_score: Option<f64>,
        /// Exact-match metadata filter, `key=value`; repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,
    },
    /// Delete one stored chunk by id
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                write_config()?;
            }
        }
        Commands::Collect {
            out,
            season_year,
            season_id,
            tournament_id,
            rounds,
            batch_size,
        } => {
            let tournament_id = match tournament_id {
                Some(id) => id,
                None => load_config()?.api.tournament_id,
            };
            collect_season(CollectOptions {
                out_dir: out,
                tournament_id,
                season_year,
                season_id,
                rounds,
                batch_size,
            })
            .await?;
        }
        Commands::Clean { base, out, seasons } => {
            clean_tree(base, out, seasons).await?;
        }
        Commands::Embed { dir } => {
            embed_directory(&dir).await?;
        }
        Commands::Search {
            query,
            k,
            min_score,
            filters,
        } => {
            search(&query, k, min_score, filters).await?;
        }
        Commands::Delete { id } => {
            delete(&id).await?;
        }
    }

    Ok(())
}
