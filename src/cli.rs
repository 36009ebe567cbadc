use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::meal_model::MealType;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate daily meal plans with a local LLM", long_about = None)]
pub struct Cli {
    /// Keep everything in memory instead of PostgreSQL
    #[arg(long, global = true)]
    pub offline: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Generate and store the meal plan for a day (default: today)
    MealPlan {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Print the consolidated grocery list for a day (default: tomorrow)
    GroceryList {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// List stored recipes
    Recipes {
        #[arg(long)]
        cuisine: Option<String>,
        #[arg(long)]
        meal_type: Option<MealType>,
        /// minutes
        #[arg(long)]
        max_prep_time: Option<u32>,
    },
    /// Check the generation service and storage configuration
    Status,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
