use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use meal_planner::cli::{parse_args, Command};
use meal_planner::config::PlannerConfig;
use meal_planner::db::{MemoryRecipeStore, PgRecipeStore, RecipeCriteria, RecipeStore};
use meal_planner::meal_model::{group_by_category, GroceryItem, MealPlan, MealType};
use meal_planner::ollama_client::{OllamaClient, SamplingOptions};
use meal_planner::plan_assembler::PlanAssembler;
use meal_planner::recipe_synthesizer::RecipeSynthesizer;

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &PlannerConfig, offline: bool) -> Result<Arc<dyn RecipeStore>> {
    if offline {
        info!("Using in-memory recipe store");
        return Ok(Arc::new(MemoryRecipeStore::new()));
    }

    info!(database_url = %config.database_url, "Connecting to recipe store");
    let store = PgRecipeStore::connect(&config.database_url)
        .await
        .context("Failed to open recipe store")?;
    Ok(Arc::new(store))
}

fn build_assembler(config: &PlannerConfig) -> Result<PlanAssembler> {
    let client = OllamaClient::new(&config.generator).context("Failed to create Ollama client")?;
    let synthesizer = RecipeSynthesizer::new(Arc::new(client), &config.generator.model)
        .with_sampling(SamplingOptions::from(&config.generator));

    Ok(PlanAssembler::new(
        synthesizer,
        config.macro_goals,
        config.preferences.clone(),
    ))
}

fn print_plan(plan: &MealPlan) {
    println!("Meal plan for {}", plan.date);
    for meal_type in MealType::ALL {
        let Some(recipe) = plan.slot(meal_type) else {
            println!("\n{meal_type}: (empty)");
            continue;
        };

        let source = if recipe.is_fallback() { " [fallback]" } else { "" };
        println!(
            "\n{meal_type}: {}{source} ({} min, {} kcal)",
            recipe.name,
            recipe.total_time(),
            recipe.nutrition.calories
        );
        for ingredient in &recipe.ingredients {
            println!("  - {ingredient}");
        }
        for (step, instruction) in recipe.instructions.iter().enumerate() {
            println!("  {}. {instruction}", step + 1);
        }
    }

    let total = plan.total_nutrition();
    println!(
        "\nTotal: {} kcal, {:.0}g protein, {:.0}g carbs, {:.0}g fat",
        total.calories, total.protein, total.carbs, total.fat
    );
}

async fn run_meal_plan(config: &PlannerConfig, store: &dyn RecipeStore, date: NaiveDate) -> Result<()> {
    let assembler = build_assembler(config)?;
    let plan = assembler.assemble_and_store(date, store).await?;
    print_plan(&plan);
    Ok(())
}

async fn run_grocery_list(config: &PlannerConfig, store: &dyn RecipeStore, date: NaiveDate) -> Result<()> {
    let assembler = build_assembler(config)?;
    let ingredients = assembler.grocery_list_for(date, store).await?;
    let items: Vec<GroceryItem> = ingredients.iter().map(GroceryItem::from).collect();

    println!("Grocery list for {date}");
    for (category, members) in group_by_category(&items) {
        println!("\n{category}");
        for item in members {
            println!("  {item}");
        }
    }
    Ok(())
}

async fn run_recipes(store: &dyn RecipeStore, criteria: RecipeCriteria) -> Result<()> {
    let recipes = store
        .recipes_by_criteria(&criteria)
        .await
        .context("Failed to query recipes")?;

    if recipes.is_empty() {
        println!("No recipes found");
    }
    for recipe in recipes {
        println!(
            "{} | {} | {} | {} min | {} kcal",
            recipe.name,
            recipe.cuisine,
            recipe.meal_type,
            recipe.total_time(),
            recipe.nutrition.calories
        );
    }
    Ok(())
}

async fn run_status(config: &PlannerConfig, offline: bool) -> Result<()> {
    println!("Model: {} at {}", config.generator.model, config.generator.base_url);
    println!(
        "Preferences: {} cuisine, {} protein, max {} min prep",
        config.preferences.cuisine, config.preferences.preferred_protein, config.preferences.max_prep_time
    );
    println!(
        "Daily goals: {} kcal, {}g protein, {}g carbs, {}g fat",
        config.macro_goals.calories, config.macro_goals.protein, config.macro_goals.carbs, config.macro_goals.fat
    );

    let client = OllamaClient::new(&config.generator)?;
    match client.list_models().await {
        Ok(models) => {
            let installed = models.iter().any(|model| model == &config.generator.model);
            println!("Ollama: reachable, {} model(s) installed", models.len());
            if !installed {
                warn!(model = %config.generator.model, "Configured model is not installed");
                println!("Warning: model {} is not installed", config.generator.model);
            }
        }
        Err(e) => println!("Ollama: unreachable ({e}); fallback recipes will be used"),
    }

    if offline {
        println!("Storage: in-memory");
    } else {
        match PgRecipeStore::connect(&config.database_url).await {
            Ok(_) => println!("Storage: connected to {}", config.database_url),
            Err(e) => println!("Storage: unavailable ({e})"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();
    init_logging(cli.log_json);

    let config = PlannerConfig::from_env().context("Failed to load configuration")?;
    info!(model = %config.generator.model, cuisine = %config.preferences.cuisine, "Starting meal planner");

    let today = Local::now().date_naive();
    match cli.command {
        Command::MealPlan { date } => {
            let store = open_store(&config, cli.offline).await?;
            run_meal_plan(&config, store.as_ref(), date.unwrap_or(today)).await
        }
        Command::GroceryList { date } => {
            let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
            let store = open_store(&config, cli.offline).await?;
            run_grocery_list(&config, store.as_ref(), date.unwrap_or(tomorrow)).await
        }
        Command::Recipes {
            cuisine,
            meal_type,
            max_prep_time,
        } => {
            let store = open_store(&config, cli.offline).await?;
            let criteria = RecipeCriteria {
                cuisine,
                meal_type,
                max_prep_time,
            };
            run_recipes(store.as_ref(), criteria).await
        }
        Command::Status => run_status(&config, cli.offline).await,
    }
}
