use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use server_api::{
    accounts, alert_rules, budgets, insights, jobs, networth, statements, subscriptions, today,
    ApiContext, OllamaClient,
};
use shared::error::ApiError;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/finance.db")]
    database_url: String,
    #[arg(long, default_value = "./uploads/statements")]
    upload_dir: PathBuf,
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_url: String,
    #[arg(long, default_value = "gemma3:4b")]
    ollama_model: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record today's balance for every active account.
    CaptureBalances,
    /// Record today's net worth.
    NetWorthSnapshot,
    /// Clear and rerun subscription detection over all accounts.
    DetectSubscriptions,
    EvaluateRules,
    CheckBudgets,
    RunInsights,
    /// Run the scheduler's daily batch once, optionally as of another date.
    RunDaily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Store a statement PDF and process it in the foreground.
    ImportStatement {
        path: PathBuf,
        #[arg(long)]
        account_id: Option<Uuid>,
    },
}

fn api_error(err: ApiError) -> anyhow::Error {
    anyhow::anyhow!("{err}")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let llm = OllamaClient::new(cli.ollama_url, cli.ollama_model)?;
    let ctx = ApiContext::new(storage, Arc::new(llm), cli.upload_dir);

    match cli.command {
        Command::CaptureBalances => {
            let captured = accounts::capture_balances(&ctx).await.map_err(api_error)?;
            println!("captured {captured} balance snapshots");
        }
        Command::NetWorthSnapshot => {
            let snapshot = networth::capture_snapshot(&ctx).await.map_err(api_error)?;
            println!(
                "net worth on {}: {:.2}",
                snapshot.snapshot_date, snapshot.net_worth
            );
        }
        Command::DetectSubscriptions => {
            let summary = subscriptions::detect_all(&ctx).await.map_err(api_error)?;
            println!("detected {} subscriptions", summary.detected);
        }
        Command::EvaluateRules => {
            let triggered = alert_rules::evaluate_rules(&ctx).await.map_err(api_error)?;
            println!("{triggered} rules triggered");
        }
        Command::CheckBudgets => {
            let raised = budgets::check_budgets(&ctx).await.map_err(api_error)?;
            println!("{raised} budget alerts raised");
        }
        Command::RunInsights => {
            let summary = insights::run(&ctx).await.map_err(api_error)?;
            println!("generated {} insights", summary.generated);
        }
        Command::RunDaily { date } => {
            let date = date.unwrap_or_else(today);
            info!(%date, "running daily jobs");
            jobs::run_daily(&ctx, date).await;
        }
        Command::ImportStatement { path, account_id } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("statement.pdf");
            let statement = statements::upload_statement(&ctx, file_name, &bytes, account_id)
                .await
                .map_err(api_error)?;
            let status = statements::process_statement(&ctx, statement.id)
                .await
                .map_err(api_error)?;
            let statement = statements::get_statement(&ctx, statement.id)
                .await
                .map_err(api_error)?;
            println!("statement {} {status}", statement.id);
            if let Some(message) = statement.error_message {
                println!("  error: {message}");
            }
        }
    }

    Ok(())
}
