//! `finstat` command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use finstat::{
    CnInfoFetcher, DictionarySet, FinstatConfig, IndustryCatalog, PriceLookup, RatioEngine,
    RunStatus, Selection, SqliteStore, StatementDownloader, StatementReader, attach_prices,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Financial statement download and ratio views")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, value_name = "FILE", default_value = "finstat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Refresh the industry catalog.
    Industries,
    /// Download statements and replace the statement table.
    Download(DownloadArgs),
    /// Print the classification of an entity.
    Lookup {
        /// Entity name.
        name: String,
    },
    /// Print a ratio view for a subclass.
    Ratios(RatiosArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false, id = "target")]
struct Target {
    /// Every entity in the subclass of this entity.
    #[arg(long, value_name = "NAME")]
    peers_of: Option<String>,
    /// Every entity in this subclass.
    #[arg(long, value_name = "NAME")]
    subclass: Option<String>,
    /// Explicit identifiers.
    #[arg(long, value_delimiter = ',', value_name = "CODE")]
    codes: Option<Vec<String>>,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(flatten)]
    target: Target,
    /// Report periods; defaults to the configured one.
    #[arg(long = "period", value_name = "YYYY-MM-DD")]
    periods: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    Income,
    Cost,
    Efficiency,
    Screening,
}

#[derive(Args)]
struct RatiosArgs {
    /// Subclass to compare.
    #[arg(long, value_name = "NAME")]
    subclass: String,
    #[arg(long, value_enum, default_value = "efficiency")]
    view: View,
    /// Keep the entities with the largest revenue.
    #[arg(long)]
    limit: Option<usize>,
    /// Trading day for closing prices; required by the screening view.
    #[arg(long, value_name = "YYYY-MM-DD")]
    price_date: Option<NaiveDate>,
}

fn load_config(path: &Path) -> Result<FinstatConfig> {
    if path.exists() {
        Ok(FinstatConfig::load(path)?)
    } else {
        info!(path = %path.display(), "No configuration file, using defaults");
        Ok(FinstatConfig::from_env())
    }
}

async fn connect(config: &FinstatConfig) -> Result<Arc<CnInfoFetcher>> {
    config.require_credentials()?;
    let fetcher = CnInfoFetcher::connect(config.provider.clone()).await?;
    if !fetcher.has_token().await {
        bail!("could not acquire an access token");
    }
    Ok(Arc::new(fetcher))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let store = Arc::new(
        SqliteStore::new(&config.database.path)
            .with_context(|| format!("open {}", config.database.path.display()))?,
    );
    let layout = Arc::new(config.layout.clone());

    match cli.cmd {
        Cmd::Industries => {
            let fetcher = connect(&config).await?;
            let catalog = IndustryCatalog::new(fetcher, layout, store)
                .with_table(&config.pipeline.industry_table);
            let outcome = catalog.refresh().await?;
            println!("industry rows: {}", outcome.rows());
        }
        Cmd::Download(args) => {
            let fetcher = connect(&config).await?;
            let catalog = IndustryCatalog::new(fetcher.clone(), layout.clone(), store.clone())
                .with_table(&config.pipeline.industry_table);
            let codes = match args.target {
                Target { peers_of: Some(name), .. } => catalog.peer_codes(&name).await?,
                Target { subclass: Some(name), .. } => catalog.codes_in_subclass(&name).await?,
                Target { codes: Some(codes), .. } => codes,
                _ => bail!("no download target given"),
            };
            if codes.is_empty() {
                bail!("no identifiers to download");
            }

            let dictionaries = DictionarySet::load(&config.dictionary.path)?;
            let periods = if args.periods.is_empty() {
                vec![config.pipeline.report_period.clone()]
            } else {
                args.periods
            };
            let report = StatementDownloader::new(fetcher, layout, Arc::new(dictionaries), store)
                .with_options(config.pipeline.clone())
                .download_periods(&codes, &periods)
                .await?;
            println!(
                "statement rows: {} ({} of {} batches failed)",
                report.rows(),
                report.failed_batches,
                report.batches
            );
            if report.status == RunStatus::Partial {
                eprintln!("warning: partial run");
            }
        }
        Cmd::Lookup { name } => {
            // Reads only the persisted catalog, no provider call.
            let fetcher = Arc::new(CnInfoFetcher::new(config.provider.clone())?);
            let catalog = IndustryCatalog::new(fetcher, layout, store)
                .with_table(&config.pipeline.industry_table);
            match catalog.lookup_entity(&name).await? {
                Some((class, subclass)) => println!("{name}: {class} / {subclass}"),
                None => bail!("{name} is not in the catalog"),
            }
        }
        Cmd::Ratios(args) => {
            let reader = StatementReader::new(store.clone()).with_tables(
                &config.pipeline.statement_table,
                &config.pipeline.industry_table,
            );
            let selection = Selection::Subclass {
                name: args.subclass.clone(),
                limit: args.limit,
            };
            let mut statements = reader.read(&selection).await?;

            if let Some(date) = args.price_date {
                let fetcher = connect(&config).await?;
                let codes = IndustryCatalog::new(fetcher.clone(), layout.clone(), store)
                    .with_table(&config.pipeline.industry_table)
                    .codes_in_subclass(&args.subclass)
                    .await?;
                let prices = PriceLookup::new(fetcher, layout)
                    .with_options(config.price.clone())
                    .closing_prices(&codes, date)
                    .await?;
                statements = attach_prices(&statements, &prices)?;
            }

            let engine = RatioEngine::new(&statements)?;
            let view = match args.view {
                View::Income => engine.income_view()?,
                View::Cost => engine.cost_view()?,
                View::Efficiency => engine.efficiency_view()?,
                View::Screening => {
                    if !engine.has_price() {
                        bail!("the screening view needs --price-date");
                    }
                    engine.screening_view()?
                }
            };
            println!("{view}");
        }
    }

    Ok(())
}
