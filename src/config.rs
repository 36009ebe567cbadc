//! # Planner Configuration Module
//!
//! This module defines configuration structures for meal planning: daily macro
//! goals, cooking preferences, text-generation settings and storage location.
//! Values default to the constants below and can be overridden from the
//! environment (a `.env` file is honoured).

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::meal_model::MealType;

// Constants for planner configuration
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:latest";
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/meal_planner";
pub const DEFAULT_CUISINE: &str = "Indian";
pub const DEFAULT_PROTEIN: &str = "chicken";
pub const DEFAULT_MAX_PREP_TIME: u32 = 30; // minutes

/// Share of the daily goals allotted to each meal slot
const BREAKFAST_SHARE: f64 = 0.25;
const LUNCH_SHARE: f64 = 0.35;
const DINNER_SHARE: f64 = 0.40;

/// Macro targets, either for a whole day or for one meal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroGoals {
    pub calories: u32,
    /// grams
    pub protein: u32,
    /// grams
    pub carbs: u32,
    /// grams
    pub fat: u32,
}

impl Default for MacroGoals {
    fn default() -> Self {
        Self {
            calories: 2000,
            protein: 150,
            carbs: 180,
            fat: 60,
        }
    }
}

impl MacroGoals {
    pub fn new(calories: u32, protein: u32, carbs: u32, fat: u32) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    /// The sub-goal for one meal slot: 25% breakfast, 35% lunch, 40% dinner,
    /// each value truncated to an integer
    pub fn split(&self, meal_type: MealType) -> MacroGoals {
        let share = match meal_type {
            MealType::Breakfast => BREAKFAST_SHARE,
            MealType::Lunch => LUNCH_SHARE,
            MealType::Dinner => DINNER_SHARE,
        };
        let portion = |value: u32| (f64::from(value) * share) as u32;

        MacroGoals {
            calories: portion(self.calories),
            protein: portion(self.protein),
            carbs: portion(self.carbs),
            fat: portion(self.fat),
        }
    }
}

/// What the user likes to eat and how long they are willing to cook
#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferences {
    pub cuisine: String,
    pub preferred_protein: String,
    /// minutes
    pub max_prep_time: u32,
    pub dietary_restrictions: Vec<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            cuisine: DEFAULT_CUISINE.to_string(),
            preferred_protein: DEFAULT_PROTEIN.to_string(),
            max_prep_time: DEFAULT_MAX_PREP_TIME,
            dietary_restrictions: Vec::new(),
        }
    }
}

/// Text-generation service settings
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Base URL of the Ollama server
    pub base_url: String,
    /// Model identifier passed with every request
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Output cap in tokens
    pub max_tokens: u32,
    /// HTTP timeout for one generation request
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2000,
            request_timeout_secs: 120,
        }
    }
}

/// Top-level configuration assembled once by the binary
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub macro_goals: MacroGoals,
    pub preferences: UserPreferences,
    pub generator: GeneratorConfig,
    pub database_url: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            macro_goals: MacroGoals::default(),
            preferences: UserPreferences::default(),
            generator: GeneratorConfig::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl PlannerConfig {
    /// Load `.env`, then apply environment overrides on top of the defaults
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("OLLAMA_URL") {
            config.generator.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.generator.model = model;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(cuisine) = lookup("MEAL_CUISINE") {
            config.preferences.cuisine = cuisine;
        }
        if let Some(protein) = lookup("MEAL_PROTEIN") {
            config.preferences.preferred_protein = protein;
        }

        parse_override(&lookup, "MEAL_MAX_PREP_TIME", &mut config.preferences.max_prep_time)?;
        parse_override(&lookup, "DAILY_CALORIES", &mut config.macro_goals.calories)?;
        parse_override(&lookup, "DAILY_PROTEIN", &mut config.macro_goals.protein)?;
        parse_override(&lookup, "DAILY_CARBS", &mut config.macro_goals.carbs)?;
        parse_override(&lookup, "DAILY_FAT", &mut config.macro_goals.fat)?;

        Ok(config)
    }
}

fn parse_override<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: '{raw}'"))?;
    }
    Ok(())
}
