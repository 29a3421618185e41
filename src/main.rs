use anyhow::{Context, Result};
use ariadne::import::ImportConfig;
use ariadne::models::EntityKind;
use ariadne::stats::ImportReport;
use ariadne::store::{PgStore, Store};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Import cultural-event spreadsheet exports into a relational archive")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the identified and no-id sheets
    Import(ImportArgs),
    /// Print row counts per table as JSON
    Stats,
    /// Print the entity/association graph as JSON
    Graph(GraphArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Directory containing the Eventi/ and Eventi-NO_ID/ exports
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Directory of identified sheets (defaults to <data-dir>/Eventi)
    #[arg(long)]
    events_dir: Option<PathBuf>,

    /// Directory of sheets without ids (defaults to <data-dir>/Eventi-NO_ID)
    #[arg(long)]
    no_id_dir: Option<PathBuf>,

    /// Hide per-sheet progress spinners
    #[arg(long)]
    no_progress: bool,

    /// Do not create missing tables before importing
    #[arg(long)]
    skip_schema: bool,
}

#[derive(Args)]
struct GraphArgs {
    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .thread_name("ariadne-import")
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn require_url(database_url: Option<String>) -> Result<String> {
    database_url.context("DATABASE_URL is not set. Pass --database-url or set it in .env")
}

fn run_import(database_url: Option<String>, args: ImportArgs) -> Result<()> {
    let database_url = require_url(database_url)?;
    let defaults = ImportConfig::from_data_dir(&args.data_dir);
    let config = ImportConfig {
        events_dir: args.events_dir.unwrap_or(defaults.events_dir),
        no_id_dir: args.no_id_dir.unwrap_or(defaults.no_id_dir),
        show_progress: !args.no_progress,
    };

    let skip_schema = args.skip_schema;
    let start = Instant::now();
    let rt = runtime()?;
    let report = rt.block_on(async {
        let store = PgStore::connect(&database_url).await?;
        if !skip_schema {
            store.ensure_schema().await?;
        }
        ariadne::import::run_import(&store, &config).await
    })?;

    print_summary(&report, start.elapsed().as_secs_f64());
    Ok(())
}

fn print_summary(report: &ImportReport, elapsed_secs: f64) {
    println!("Import completed.");
    println!();
    println!("=== Summary ===");
    println!("Total time:         {elapsed_secs:.2}s");
    println!("Rows read:          {}", report.rows_read);
    for kind in EntityKind::ALL {
        let upserted = report.upserted.get(&kind).copied().unwrap_or_default();
        let seeded = report.seeded.get(&kind).copied().unwrap_or_default();
        if upserted + seeded > 0 {
            println!(
                "{:<20}{upserted} upserted, {seeded} seeded",
                format!("{}:", kind.table())
            );
        }
    }
    println!("Already present:    {}", report.total_matched());
    println!("Links created:      {}", report.links_created);
    println!("Links existing:     {}", report.links_existing);
    println!("Links unresolved:   {}", report.links_unresolved);
    println!("Rows without id:    {}", report.missing_stable_id);
    println!("Rows without name:  {}", report.missing_name);
    if report.unwritten > 0 {
        println!("Writes with no row: {}", report.unwritten);
    }
}

fn run_stats(database_url: Option<String>) -> Result<()> {
    let database_url = require_url(database_url)?;
    let totals = runtime()?.block_on(async {
        let store = PgStore::connect(&database_url).await?;
        ariadne::views::totals(&store).await
    })?;
    println!("{}", serde_json::to_string_pretty(&totals)?);
    Ok(())
}

fn run_graph(database_url: Option<String>, args: GraphArgs) -> Result<()> {
    let database_url = require_url(database_url)?;
    let graph = runtime()?.block_on(async {
        let store = PgStore::connect(&database_url).await?;
        ariadne::views::graph(&store).await
    })?;

    let json = serde_json::to_string_pretty(&graph)?;
    match args.out {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("Failed to write graph to {}", path.display()))?;
            info!(
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                path = %path.display(),
                "Graph written"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Import(args) => run_import(cli.database_url, args),
        Commands::Stats => run_stats(cli.database_url),
        Commands::Graph(args) => run_graph(cli.database_url, args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
