use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pantry::availability::AvailabilityCalculator;
use pantry::bulk_import::{self, ImportMode};
use pantry::config::{LogFormat, PantryConfig};
use pantry::consumption::{apply_changes, plan_consumption};
use pantry::db;
use pantry::errors::PantryError;
use pantry::expiration::expiring_items;
use pantry::localization::{init_localization, get_localization_manager};
use pantry::meal_plan::{generate_plan, plan_chunks, validate_plan_request, PlanChunkResult};
use pantry::pantry_model::{MealPlan, MealPlanConfig, PantryItem, Recipe, RecipeIngredient};
use pantry::shopping::{build_shopping_list, format_shopping_list};

#[derive(Parser)]
#[command(name = "pantry")]
#[command(about = "Pantry stock, recipe availability and meal planning")]
#[command(version)]
struct Cli {
    /// PostgreSQL connection string; pantry data is read from and written to it
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Pantry items as a JSON array (used when no database is configured)
    #[arg(long, short = 'p', global = true)]
    pantry: Option<PathBuf>,

    /// Owner whose pantry is used with a database
    #[arg(long, default_value = "local", global = true)]
    owner: String,

    /// Language for user-facing text (en, es)
    #[arg(long, global = true)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check which ingredients of a recipe the pantry covers
    Check {
        /// Recipe JSON (a recipe object or a list of ingredients)
        #[arg(long, short = 'r')]
        recipe: PathBuf,
    },
    /// Cook a recipe, deducting its ingredients from the pantry
    Cook {
        #[arg(long, short = 'r')]
        recipe: PathBuf,
        /// Only print the stock changes
        #[arg(long)]
        dry_run: bool,
    },
    /// Import pantry items from a CSV spreadsheet
    Import {
        /// CSV file; omit with --template
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "add")]
        mode: ModeArg,
        /// Print an example spreadsheet and exit
        #[arg(long)]
        template: bool,
        /// Target pantry id
        #[arg(long)]
        pantry_id: Option<i64>,
    },
    /// List expired and soon to expire items
    Expiring {
        /// Reference day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Build a meal plan from a request and pre-generated chunk results
    Plan {
        /// Meal plan request JSON
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// JSON array with one generated result per chunk; omit to only show chunks
        #[arg(long)]
        results: Option<PathBuf>,
    },
    /// Print the shopping list for a recipe
    Shopping {
        #[arg(long, short = 'r')]
        recipe: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Add,
    Replace,
}

impl From<ModeArg> for ImportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Add => ImportMode::Add,
            ModeArg::Replace => ImportMode::Replace,
        }
    }
}

/// Recipe input: a full recipe or a bare ingredient list
#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeInput {
    Recipe(Recipe),
    Ingredients(Vec<RecipeIngredient>),
}

impl RecipeInput {
    fn into_recipe(self, path: &Path) -> Recipe {
        match self {
            RecipeInput::Recipe(recipe) => recipe,
            RecipeInput::Ingredients(ingredients) => {
                let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("recipe");
                Recipe::new(name, ingredients)
            }
        }
    }
}

/// Where pantry items come from
enum PantrySource {
    File(PathBuf),
    Database { pool: PgPool, owner: String },
}

impl PantrySource {
    async fn load(&self) -> Result<Vec<PantryItem>> {
        match self {
            PantrySource::File(path) => read_json(path),
            PantrySource::Database { pool, owner } => db::list_items(pool, owner, None).await,
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn read_recipe(path: &Path) -> Result<Recipe> {
    let input: RecipeInput = read_json(path)?;
    Ok(input.into_recipe(path))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = PantryConfig::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();
    let language = cli.lang.clone().unwrap_or_else(|| config.language.clone());
    init_localization(&config.locales_dir)?;

    info!("Starting pantry {}", env!("CARGO_PKG_VERSION"));

    let database_url = cli.database_url.clone().or_else(|| config.database_url.clone());
    let source = match (&database_url, &cli.pantry) {
        (Some(url), _) => {
            info!("Connecting to database");
            let pool = PgPool::connect(url).await.context("Failed to connect to database")?;
            db::init_database_schema(&pool).await?;
            Some(PantrySource::Database {
                pool,
                owner: cli.owner.clone(),
            })
        }
        (None, Some(path)) => Some(PantrySource::File(path.clone())),
        (None, None) => None,
    };

    match cli.command {
        Commands::Import {
            file,
            mode,
            template,
            pantry_id,
        } => {
            if template {
                print!("{}", bulk_import::template_csv()?);
                return Ok(());
            }
            let file = file.ok_or_else(|| anyhow!("a CSV file is required unless --template is given"))?;
            run_import(source.as_ref(), &file, mode.into(), pantry_id, &language).await
        }
        command => {
            let source = source.ok_or_else(|| anyhow!("no pantry: pass --pantry <FILE> or --database-url"))?;
            run_command(command, &source, &config, &language).await
        }
    }
}

async fn run_command(command: Commands, source: &PantrySource, config: &PantryConfig, language: &str) -> Result<()> {
    let pantry_items = source.load().await?;
    let localization = get_localization_manager();

    match command {
        Commands::Check { recipe } => {
            let recipe = read_recipe(&recipe)?;
            let calculator = AvailabilityCalculator::new(config.availability.clone());
            let report = calculator.calculate(&recipe.ingredients, &pantry_items)?;

            let total = recipe.ingredients.len().to_string();
            let available = (recipe.ingredients.len() - report.result.missing_items.len()).to_string();
            let percentage = report.result.available_percentage.to_string();
            eprintln!(
                "{}",
                localization.get_message_with_args(
                    "availability-summary",
                    language,
                    &[
                        ("available", available.as_str()),
                        ("total", total.as_str()),
                        ("percentage", percentage.as_str()),
                    ],
                )
            );
            if let Some(missing) = report.describe_missing(localization, language) {
                eprintln!("{missing}");
            }
            for conflict in report.describe_conflicts(localization, language) {
                eprintln!("{conflict}");
            }
            print_json(&report)
        }
        Commands::Cook { recipe, dry_run } => {
            let recipe = read_recipe(&recipe)?;
            let plan = plan_consumption(&recipe, &pantry_items, config.consumption.zero_stock, Utc::now());
            if !dry_run {
                match source {
                    PantrySource::File(path) => {
                        write_json(path, &apply_changes(&pantry_items, &plan.changes))?;
                    }
                    PantrySource::Database { pool, owner } => {
                        db::apply_stock_changes(pool, owner, &plan.changes).await?;
                        db::save_cooked_recipe(pool, owner, &plan.cooked).await?;
                    }
                }
                info!("Cooked '{}' with {} stock changes", recipe.name, plan.changes.len());
            }
            print_json(&plan)
        }
        Commands::Expiring { today } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            for (item, status) in expiring_items(&pantry_items, today, &config.expiration) {
                println!("{}: {}", item.name, status.describe(localization, language));
            }
            Ok(())
        }
        Commands::Plan { config: request, results } => {
            let request: MealPlanConfig = read_json(&request)?;
            let Some(results) = results else {
                validate_plan_request(&request, &pantry_items, &config.planner)?;
                return print_json(&plan_chunks(&request, &config.planner));
            };

            let mut results: VecDeque<PlanChunkResult> = read_json::<Vec<PlanChunkResult>>(&results)?.into();
            let draft = generate_plan(&request, &pantry_items, &config.planner, |chunk| {
                let next = results.pop_front().ok_or_else(|| {
                    PantryError::Plan(format!("no generated result for chunk starting {}", chunk.config.start_date))
                });
                async move { next }
            })
            .await?;

            let mut plan = MealPlan {
                id: None,
                config: request,
                meals: draft.meals,
                shopping_list: draft.shopping_list,
                generated_at: Utc::now(),
            };
            if let PantrySource::Database { pool, owner } = source {
                plan.id = Some(db::save_meal_plan(pool, owner, &plan).await?);
            }
            print_json(&plan)
        }
        Commands::Shopping { recipe } => {
            let recipe = read_recipe(&recipe)?;
            let calculator = AvailabilityCalculator::new(config.availability.clone());
            let stock = calculator.stock(&pantry_items);
            let report = calculator.calculate(&recipe.ingredients, &pantry_items)?;
            let list = build_shopping_list(&report.result.missing_items, &stock);
            println!("{}", format_shopping_list(&list, localization, language));
            Ok(())
        }
        Commands::Import { .. } => bail!("import is handled separately"),
    }
}

async fn run_import(
    source: Option<&PantrySource>,
    file: &Path,
    mode: ImportMode,
    pantry_id: Option<i64>,
    language: &str,
) -> Result<()> {
    let content = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let rows = bulk_import::parse_csv(&content)?;
    let localization = get_localization_manager();

    for (line, row) in rows.iter().enumerate().filter(|(_, row)| !row.is_valid()) {
        let issues: Vec<String> = row.issues.iter().map(|i| i.describe(localization, language)).collect();
        eprintln!("row {}: {}", line + 2, issues.join(", "));
    }

    let items = bulk_import::selected_items(&rows, pantry_id);
    match source {
        Some(PantrySource::Database { pool, owner }) => {
            if mode == ImportMode::Replace {
                db::delete_all_items(pool, owner, pantry_id).await?;
            }
            let count = db::create_items(pool, owner, &items).await?;
            info!("Imported {} items", count);
        }
        Some(PantrySource::File(path)) => {
            let existing: Vec<PantryItem> = if path.exists() { read_json(path)? } else { Vec::new() };
            let pantry_items = bulk_import::merge_import(existing, items.clone(), mode, pantry_id);
            write_json(path, &pantry_items)?;
            info!("Imported {} items into {}", items.len(), path.display());
        }
        None => {}
    }

    print_json(&items)
}
