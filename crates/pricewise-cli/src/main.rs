use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pricewise_core::{
    AliasOrigin, Catalog, EngineConfig, MergeApproval, MergeOutcome, PricewiseError, ProductId,
    Resolution,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pricewise",
    about = "Product identity resolution for flyer price catalogs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting PRICEWISE_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Database file, overriding `storage.database_path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a raw product name without creating anything.
    Resolve {
        name: String,
        #[arg(long)]
        brand: Option<String>,
        /// Fuzzy threshold in [0, 1]; defaults to the configured one.
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Resolve a name, creating the product when nothing matches.
    Ingest {
        name: String,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Record a price for the resolved product, in cents.
        #[arg(long)]
        price: Option<i64>,
        #[arg(long)]
        store: Option<String>,
    },

    /// Alias management.
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },

    /// List products.
    Products {
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// List duplicate candidates, most similar first.
    Duplicates {
        #[arg(long)]
        min_similarity: Option<f64>,
    },

    /// List similar pairs held back by brand or variant markers.
    Related {
        #[arg(long)]
        min_similarity: Option<f64>,
    },

    /// Merge two products. The earlier one survives.
    Merge {
        first: String,
        second: String,
        /// Apply the automatic-mode checks (brand and auto-merge threshold).
        #[arg(long)]
        auto: bool,
    },

    /// Merge every candidate at or above the auto-merge threshold.
    MergeAll,

    /// Report products that alias each other instead of being merged.
    Audit,

    /// Recompute stored normalized keys.
    Renormalize,

    /// Show catalog statistics.
    Stats,

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AliasAction {
    /// Bind an alternate name to a product.
    Add {
        product_id: String,
        text: String,
        #[arg(long, default_value = "manual")]
        origin: String,
        #[arg(long, default_value = "1.0")]
        confidence: f64,
    },
    /// List a product's aliases.
    List { product_id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config.
    Show,
    /// Print the config file path.
    Path,
    /// Write the default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> std::process::ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("PRICEWISE_JSON").as_deref() == Ok("1");

    match run(cli, json_output) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code_for(&err);
            if json_output {
                let body = serde_json::json!({
                    "status": "error",
                    "error": error_kind(&err),
                    "message": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            } else {
                eprintln!("error: {err:#}");
            }
            std::process::ExitCode::from(code)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PRICEWISE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli, json_output: bool) -> Result<()> {
    let start = Instant::now();
    let mut config = EngineConfig::load()?;
    if let Some(db) = &cli.db {
        config.storage.database_path = db.to_string_lossy().to_string();
    }

    match cli.command {
        Commands::Config { action } => run_config(action, &config, json_output),
        command => {
            let catalog = Catalog::from_config(config)?;
            debug!(db = catalog.pool().path().unwrap_or(":memory:"), "catalog opened");
            run_command(&catalog, command, json_output, start)
        }
    }
}

fn run_command(catalog: &Catalog, command: Commands, json_output: bool, start: Instant) -> Result<()> {
    match command {
        Commands::Resolve { name, brand, threshold } => {
            let resolution = catalog.resolve_with_threshold(&name, brand.as_deref(), threshold)?;
            if json_output {
                print_ok(&resolution, start)?;
            } else {
                match resolution {
                    Resolution::Matched(m) => {
                        println!("{}  {:<13}  {:.3}", m.product_id, m.stage, m.similarity)
                    }
                    Resolution::NotFound => println!("No match for: {name}"),
                }
            }
        }

        Commands::Ingest { name, brand, category, price, store } => {
            let ingested =
                catalog.get_or_create_product(&name, brand.as_deref(), category.as_deref())?;
            let recorded = match price {
                Some(cents) => Some(catalog.record_price(ingested.product_id, cents, store.as_deref())?),
                None => None,
            };

            if json_output {
                print_ok(&serde_json::json!({ "ingested": ingested, "price": recorded }), start)?;
            } else {
                let verb = if ingested.created { "Created" } else { "Matched" };
                println!("{verb}: {}", ingested.product_id);
                if let Some(price) = recorded {
                    println!("Price recorded: {} cents", price.amount_cents);
                }
            }
        }

        Commands::Alias { action } => match action {
            AliasAction::Add { product_id, text, origin, confidence } => {
                let product_id = parse_id(&product_id)?;
                let origin: AliasOrigin = origin.parse()?;
                let inserted = catalog.add_alias(product_id, &text, origin, confidence)?;
                if json_output {
                    print_ok(&serde_json::json!({ "inserted": inserted }), start)?;
                } else if inserted {
                    println!("Alias added: {text}");
                } else {
                    println!("Alias already present: {text}");
                }
            }
            AliasAction::List { product_id } => {
                let product_id = parse_id(&product_id)?;
                let aliases = catalog.list_aliases(product_id)?;
                if json_output {
                    print_ok(&aliases, start)?;
                } else if aliases.is_empty() {
                    println!("No aliases.");
                } else {
                    for alias in &aliases {
                        println!(
                            "{:<40}  {:<6}  {:.2}  {}",
                            alias.alias_text, alias.origin, alias.confidence, alias.created_by
                        );
                    }
                }
            }
        },

        Commands::Products { limit, offset } => {
            let products = catalog.list_products(limit, offset)?;
            if json_output {
                let total = catalog.count_products()?;
                print_ok(
                    &serde_json::json!({ "items": products, "total": total, "limit": limit, "offset": offset }),
                    start,
                )?;
            } else if products.is_empty() {
                println!("No products. Use `pricewise ingest` to add some.");
            } else {
                for product in &products {
                    println!(
                        "{}  {:<40}  {}",
                        product.id,
                        product.display_name,
                        product.brand.as_deref().unwrap_or("")
                    );
                }
            }
        }

        Commands::Duplicates { min_similarity } => {
            let candidates = catalog.list_duplicate_candidates(min_similarity)?;
            if json_output {
                print_ok(&candidates, start)?;
            } else if candidates.is_empty() {
                println!("No duplicate candidates.");
            } else {
                for c in &candidates {
                    println!(
                        "{:.3}  {}  <-  {}",
                        c.similarity, c.first.display_name, c.second.display_name
                    );
                }
            }
        }

        Commands::Related { min_similarity } => {
            let related = catalog.list_related_candidates(min_similarity)?;
            if json_output {
                print_ok(&related, start)?;
            } else if related.is_empty() {
                println!("No related pairs.");
            } else {
                for r in &related {
                    println!(
                        "{:.3}  {:<16}  {}  |  {}",
                        r.similarity, r.reason, r.first.display_name, r.second.display_name
                    );
                }
            }
        }

        Commands::Merge { first, second, auto } => {
            let approval = if auto { MergeApproval::Automatic } else { MergeApproval::Approved };
            let outcome = catalog.propose_merge(parse_id(&first)?, parse_id(&second)?, approval)?;
            if let MergeOutcome::Applied(report) = &outcome {
                if json_output {
                    print_ok(report, start)?;
                } else {
                    println!("Merged {} into {}", report.loser_id, report.survivor_id);
                    println!("  Prices repointed: {}", report.prices_repointed);
                    println!("  Aliases moved:    {}", report.aliases_moved);
                }
            }
            outcome.into_result()?;
        }

        Commands::MergeAll => {
            let report = catalog.merge_all_candidates()?;
            if json_output {
                print_ok(&report, start)?;
            } else {
                println!("Merge run:");
                println!("  Considered: {}", report.considered);
                println!("  Applied:    {}", report.applied);
                println!("  Rejected:   {}", report.rejected);
                println!("  Skipped:    {}", report.skipped);
            }
        }

        Commands::Audit => {
            let pairs = catalog.find_bidirectional_aliases()?;
            if json_output {
                print_ok(&pairs, start)?;
            } else if pairs.is_empty() {
                println!("No bidirectional aliases.");
            } else {
                for p in &pairs {
                    println!("{}  <->  {}", p.first_name, p.second_name);
                }
            }
        }

        Commands::Renormalize => {
            let report = catalog.renormalize()?;
            if json_output {
                print_ok(&report, start)?;
            } else {
                println!("Products updated: {}", report.products_updated);
                println!("Aliases updated:  {}", report.aliases_updated);
                for c in &report.conflicts {
                    println!("  conflict: {} '{}' -> '{}'", c.id, c.current, c.recomputed);
                }
            }
        }

        Commands::Stats => {
            let stats = catalog.stats()?;
            if json_output {
                print_ok(&stats, start)?;
            } else {
                println!("Catalog statistics:");
                println!("  Products:         {}", stats.products);
                println!("  Branded products: {}", stats.branded_products);
                println!("  Aliases:          {}", stats.aliases);
                for (origin, count) in &stats.aliases_by_origin {
                    println!("    {origin:<8} {count}");
                }
                println!("  Prices:           {}", stats.prices);
            }
        }

        Commands::Config { action } => run_config(action, catalog.config(), json_output)?,
    }

    Ok(())
}

fn run_config(action: ConfigAction, config: &EngineConfig, json_output: bool) -> Result<()> {
    let path = EngineConfig::config_path();
    match action {
        ConfigAction::Show => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                print!("{}", config.to_toml()?);
            }
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(PricewiseError::ConfigError(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ))
                .into());
            }
            EngineConfig::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_ok<T: serde::Serialize + ?Sized>(data: &T, start: Instant) -> Result<()> {
    let body = serde_json::json!({
        "status": "ok",
        "data": data,
        "meta": { "duration_ms": start.elapsed().as_millis() }
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn parse_id(raw: &str) -> Result<ProductId> {
    ProductId::parse_str(raw.trim())
        .map_err(|e| PricewiseError::InvalidInput(format!("invalid product id '{raw}': {e}")).into())
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<PricewiseError>()
        .map(|e| e.exit_code())
        .unwrap_or(pricewise_core::ExitCode::GeneralError);
    code.code() as u8
}

fn error_kind(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<PricewiseError>() {
        Some(PricewiseError::InvalidInput(_)) => "invalid_input",
        Some(PricewiseError::ConstraintViolation(_)) => "constraint_violation",
        Some(PricewiseError::ProductNotFound(_)) => "not_found",
        Some(PricewiseError::MergeRejected(_)) => "merge_rejected",
        Some(PricewiseError::PartialMergeFailure { .. }) => "partial_merge_failure",
        Some(PricewiseError::ConfigError(_)) => "config",
        _ => "error",
    }
}
