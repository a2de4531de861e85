//! ApplyKit CLI - process application forms from the command line

mod csv;

use applykit::{processor_from_config, Config, ProcessRequest, ProcessingStatus, Processor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ApplyKit - scrape application pages, extract questions, draft answers
#[derive(Parser, Debug)]
#[command(name = "applykit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one application: scrape both pages, extract, answer, persist
    Run {
        /// Application name (used for the output directory)
        #[arg(long)]
        name: String,

        /// URL of the page describing the program
        #[arg(long)]
        info_url: String,

        /// URL of the page containing the form
        #[arg(long)]
        form_url: String,

        /// Where results are written
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Disable the scrape and LLM response caches
        #[arg(long)]
        no_cache: bool,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Process a CSV batch file (columns: app_name,info_url,form_url)
    Batch {
        /// Path to the batch file
        file: PathBuf,

        /// Where results are written
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Disable the scrape and LLM response caches
        #[arg(long)]
        no_cache: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,applykit=info",
        1 => "info,applykit=debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let exit_code = match cli.command {
        Commands::Run {
            name,
            info_url,
            form_url,
            output_dir,
            no_cache,
            json,
        } => {
            let processor = match build_processor(output_dir, no_cache) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
            };
            run_one(&processor, name, info_url, form_url, json).await
        }
        Commands::Batch {
            file,
            output_dir,
            no_cache,
        } => {
            let processor = match build_processor(output_dir, no_cache) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
            };
            run_batch(&processor, &file).await
        }
    };

    std::process::exit(exit_code);
}

fn build_processor(
    output_dir: Option<PathBuf>,
    no_cache: bool,
) -> applykit::Result<Processor> {
    let mut config = Config::from_env()?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if no_cache {
        config.use_cache = false;
    }
    processor_from_config(&config)
}

async fn run_one(
    processor: &Processor,
    name: String,
    info_url: String,
    form_url: String,
    json: bool,
) -> i32 {
    let result = processor
        .process(&ProcessRequest {
            app_name: name,
            info_url,
            form_url,
        })
        .await;

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error serializing result: {e}");
                return 2;
            }
        }
    } else {
        print_summary(&result);
    }

    match result.status {
        ProcessingStatus::Failed => 1,
        _ => 0,
    }
}

async fn run_batch(processor: &Processor, file: &std::path::Path) -> i32 {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading {}: {e}", file.display());
            return 2;
        }
    };
    let rows = match csv::parse_batch(&text) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error parsing {}: {e}", file.display());
            return 2;
        }
    };
    if rows.is_empty() {
        eprintln!("No applications found in {}", file.display());
        return 2;
    }

    println!("Processing {} application(s)\n", rows.len());
    let mut failed = 0usize;

    for (i, row) in rows.iter().enumerate() {
        println!("[{}/{}] {}", i + 1, rows.len(), row.app_name);
        let result = processor
            .process(&ProcessRequest {
                app_name: row.app_name.clone(),
                info_url: row.info_url.clone(),
                form_url: row.form_url.clone(),
            })
            .await;
        print_summary(&result);
        if result.status == ProcessingStatus::Failed {
            failed += 1;
        }
        println!();
    }

    println!(
        "Done: {} succeeded, {} failed",
        rows.len() - failed,
        failed
    );
    if failed > 0 {
        1
    } else {
        0
    }
}

fn print_summary(result: &applykit::ProcessingResult) {
    let status = match result.status {
        ProcessingStatus::Success => "success",
        ProcessingStatus::Partial => "partial",
        ProcessingStatus::Failed => "failed",
    };
    println!(
        "  status: {status}  questions: {}  answers: {}",
        result.questions.len(),
        result.answers.len()
    );
    for error in &result.errors {
        eprintln!("  error [{:?}]: {}", error.stage, error.message);
    }
}
