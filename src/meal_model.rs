//! # Meal Planning Data Model
//!
//! This module defines the value objects produced by recipe generation and consumed
//! by persistence and display: ingredients, nutrition facts, recipes and daily plans.
//!
//! ## Core Concepts
//!
//! - **Ingredient**: a named amount in some unit; `(name, unit)` is its identity
//! - **NutritionInfo**: calories and macronutrients, summable across recipes
//! - **Recipe**: a complete dish for one meal slot, scalable to any serving count
//! - **MealPlan**: one calendar day with optional breakfast, lunch and dinner
//!
//! ## Usage
//!
//! ```rust
//! use meal_planner::meal_model::{Ingredient, MealPlan, MealType, NutritionInfo, Recipe};
//! use chrono::NaiveDate;
//!
//! let omelette = Recipe::new("Omelette", "French", MealType::Breakfast)
//!     .with_ingredients(vec![Ingredient::new("egg", 2.0, "pieces")])
//!     .with_nutrition(NutritionInfo::new(300, 18.0, 2.0, 22.0));
//!
//! let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let plan = MealPlan::new(date).with_slot(MealType::Breakfast, omelette);
//! assert_eq!(plan.total_nutrition().calories, 300);
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use crate::planner_errors::DivisionError;

/// Tag carried by recipes produced from model output
pub const TAG_AI_GENERATED: &str = "ai-generated";
/// Tag carried by statically authored substitutes
pub const TAG_FALLBACK: &str = "fallback";

/// The three meal slots of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    /// All slots in the order they are eaten
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(format!("unknown meal type: {other}")),
        }
    }
}

/// A single recipe ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Name of the food item (e.g. "eggs", "basmati rice")
    pub name: String,
    /// Non-negative quantity expressed in `unit`
    pub amount: f64,
    /// Unit of measurement (e.g. "grams", "cup", "pieces")
    pub unit: String,
    /// Shopping category such as "protein" or "vegetable"; may be empty
    #[serde(default)]
    pub category: String,
}

impl Ingredient {
    /// Create an ingredient without a category
    pub fn new(name: &str, amount: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            amount,
            unit: unit.to_string(),
            category: String::new(),
        }
    }

    /// Set the shopping category
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    /// Identity used when consolidating shopping lists
    pub fn consolidation_key(&self) -> (&str, &str) {
        (&self.name, &self.unit)
    }

    /// Return a copy with the amount multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            amount: self.amount * factor,
            ..self.clone()
        }
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount.fract() == 0.0 {
            write!(f, "{} {} {}", self.amount as i64, self.unit, self.name)
        } else {
            write!(f, "{} {} {}", self.amount, self.unit, self.name)
        }
    }
}

/// Nutritional facts for one serving of a recipe
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionInfo {
    pub calories: u32,
    /// grams
    pub protein: f64,
    /// grams
    pub carbs: f64,
    /// grams
    pub fat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium: Option<f64>,
}

impl NutritionInfo {
    pub fn new(calories: u32, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
            ..Self::default()
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

fn add_optional(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

impl Add for NutritionInfo {
    type Output = NutritionInfo;

    fn add(self, rhs: NutritionInfo) -> NutritionInfo {
        NutritionInfo {
            calories: self.calories.saturating_add(rhs.calories),
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
            fiber: add_optional(self.fiber, rhs.fiber),
            sugar: add_optional(self.sugar, rhs.sugar),
            sodium: add_optional(self.sodium, rhs.sodium),
        }
    }
}

/// A complete recipe for one meal slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub cuisine: String,
    pub meal_type: MealType,
    /// minutes
    pub prep_time: u32,
    /// minutes
    pub cook_time: u32,
    pub servings: u32,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    pub nutrition: NutritionInfo,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// Create an empty single-serving recipe
    pub fn new(name: &str, cuisine: &str, meal_type: MealType) -> Self {
        Self {
            name: name.to_string(),
            cuisine: cuisine.to_string(),
            meal_type,
            prep_time: 0,
            cook_time: 0,
            servings: 1,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            nutrition: NutritionInfo::zero(),
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_times(mut self, prep_time: u32, cook_time: u32) -> Self {
        self.prep_time = prep_time;
        self.cook_time = cook_time;
        self
    }

    pub fn with_servings(mut self, servings: u32) -> Self {
        self.servings = servings;
        self
    }

    pub fn with_ingredients(mut self, ingredients: Vec<Ingredient>) -> Self {
        self.ingredients = ingredients;
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_nutrition(mut self, nutrition: NutritionInfo) -> Self {
        self.nutrition = nutrition;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Preparation plus cooking time in minutes
    pub fn total_time(&self) -> u32 {
        self.prep_time + self.cook_time
    }

    /// Whether this recipe is a static substitute rather than a generated one
    pub fn is_fallback(&self) -> bool {
        self.tags.iter().any(|tag| tag == TAG_FALLBACK)
    }

    /// Ingredients rescaled from `self.servings` to `servings`
    pub fn scaled_ingredients(&self, servings: u32) -> Result<Vec<Ingredient>, DivisionError> {
        if self.servings == 0 || servings == 0 {
            return Err(DivisionError {
                servings: self.servings,
                target: servings,
            });
        }

        let factor = f64::from(servings) / f64::from(self.servings);
        Ok(self.ingredients.iter().map(|i| i.scaled(factor)).collect())
    }

    /// A copy of this recipe rescaled to `servings`
    pub fn scale(&self, servings: u32) -> Result<Recipe, DivisionError> {
        let ingredients = self.scaled_ingredients(servings)?;
        Ok(Recipe {
            servings,
            ingredients,
            ..self.clone()
        })
    }
}

/// One day of meals; each slot may be empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub date: NaiveDate,
    pub breakfast: Option<Recipe>,
    pub lunch: Option<Recipe>,
    pub dinner: Option<Recipe>,
}

impl MealPlan {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            breakfast: None,
            lunch: None,
            dinner: None,
        }
    }

    /// Fill a slot at construction time
    pub fn with_slot(mut self, meal_type: MealType, recipe: Recipe) -> Self {
        match meal_type {
            MealType::Breakfast => self.breakfast = Some(recipe),
            MealType::Lunch => self.lunch = Some(recipe),
            MealType::Dinner => self.dinner = Some(recipe),
        }
        self
    }

    pub fn slot(&self, meal_type: MealType) -> Option<&Recipe> {
        match meal_type {
            MealType::Breakfast => self.breakfast.as_ref(),
            MealType::Lunch => self.lunch.as_ref(),
            MealType::Dinner => self.dinner.as_ref(),
        }
    }

    /// Present recipes in slot order
    pub fn recipes(&self) -> Vec<&Recipe> {
        MealType::ALL
            .iter()
            .filter_map(|meal_type| self.slot(*meal_type))
            .collect()
    }

    /// Whether every slot holds a recipe
    pub fn is_complete(&self) -> bool {
        MealType::ALL.iter().all(|meal_type| self.slot(*meal_type).is_some())
    }

    /// Sum of the nutrition of all present recipes
    pub fn total_nutrition(&self) -> NutritionInfo {
        self.recipes()
            .into_iter()
            .fold(NutritionInfo::zero(), |total, recipe| {
                total + recipe.nutrition.clone()
            })
    }

    /// Minutes spent in the kitchen across the day
    pub fn total_time(&self) -> u32 {
        self.recipes().iter().map(|recipe| recipe.total_time()).sum()
    }

    /// All ingredients of the day merged by `(name, unit)`
    pub fn grocery_list(&self) -> Vec<Ingredient> {
        consolidate_ingredients(
            self.recipes()
                .into_iter()
                .flat_map(|recipe| recipe.ingredients.iter()),
        )
    }
}

/// Merge ingredients sharing a `(name, unit)` identity by summing amounts.
///
/// Output follows the order in which each identity was first seen; the category
/// of the first occurrence wins.
pub fn consolidate_ingredients<'a, I>(ingredients: I) -> Vec<Ingredient>
where
    I: IntoIterator<Item = &'a Ingredient>,
{
    let mut consolidated: Vec<Ingredient> = Vec::new();
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();

    for ingredient in ingredients {
        let key = ingredient.consolidation_key();
        match positions.get(&key) {
            Some(&index) => consolidated[index].amount += ingredient.amount,
            None => {
                positions.insert(key, consolidated.len());
                consolidated.push(ingredient.clone());
            }
        }
    }

    consolidated
}

/// A shopping list entry derived from a consolidated ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub category: String,
    pub checked: bool,
    /// 1 = low, 2 = medium, 3 = high
    pub priority: u8,
}

impl From<&Ingredient> for GroceryItem {
    fn from(ingredient: &Ingredient) -> Self {
        Self {
            name: ingredient.name.clone(),
            amount: ingredient.amount,
            unit: ingredient.unit.clone(),
            category: ingredient.category.clone(),
            checked: false,
            priority: 1,
        }
    }
}

impl fmt::Display for GroceryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.checked { "x" } else { " " };
        write!(f, "[{mark}] {} {} {}", self.amount, self.unit, self.name)
    }
}

/// Group a grocery list by category, in first-seen category order.
///
/// Items with an empty category are filed under "Other".
pub fn group_by_category(items: &[GroceryItem]) -> Vec<(String, Vec<GroceryItem>)> {
    let mut groups: Vec<(String, Vec<GroceryItem>)> = Vec::new();

    for item in items {
        let category = if item.category.trim().is_empty() {
            "Other".to_string()
        } else {
            item.category.clone()
        };

        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(item.clone()),
            None => groups.push((category, vec![item.clone()])),
        }
    }

    groups
}
