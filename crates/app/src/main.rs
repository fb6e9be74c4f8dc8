use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::RunRequest;

#[derive(Parser, Debug)]
#[command(name = "conciliar")]
#[command(version, about = "Reconcile a bank statement against the sales book and the expense registry")]
struct Cli {
    /// Bank statement CSV
    #[arg(long)]
    bank: PathBuf,

    /// Sales book CSV
    #[arg(long)]
    sales: PathBuf,

    /// Expense registry CSV
    #[arg(long)]
    expenses: PathBuf,

    /// Where to write the reconciliation table
    #[arg(short, long, default_value = "conciliacion.csv")]
    output: PathBuf,

    /// TOML file overriding tolerances and markers
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = ",")]
    bank_delimiter: String,

    #[arg(long, default_value = ";")]
    sales_delimiter: String,

    #[arg(long, default_value = ",")]
    expenses_delimiter: String,

    /// Print the summary and audit as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn request(&self) -> RunRequest {
        RunRequest {
            bank: self.bank.clone(),
            sales: self.sales.clone(),
            expenses: self.expenses.clone(),
            output: self.output.clone(),
            config: self.config.clone(),
            bank_delimiter: self.bank_delimiter.clone(),
            sales_delimiter: self.sales_delimiter.clone(),
            expenses_delimiter: self.expenses_delimiter.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // The engine is synchronous; keep it off the runtime's async workers.
    let request = cli.request();
    let outcome = tokio::task::spawn_blocking(move || commands::reconcile_files(&request)).await??;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", commands::render_summary(&outcome));
    }
    Ok(())
}
