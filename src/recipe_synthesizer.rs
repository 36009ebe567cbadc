//! # Recipe Synthesizer Module
//!
//! This module turns meal constraints into a validated [`Recipe`]. It renders the
//! generation prompt, calls the text-generation capability, runs the reply through
//! the repair pipeline and coerces the recovered fields into domain types.
//!
//! ## Failure containment
//!
//! Every generation-path failure (capability error, no JSON in the reply, a field
//! that cannot be coerced) is handled inside [`RecipeSynthesizer::synthesize`]: the
//! failure is logged and a recipe from the [`FallbackTable`] is returned instead,
//! tagged `fallback`. Callers always receive a recipe.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meal_planner::config::{GeneratorConfig, MacroGoals};
//! use meal_planner::meal_model::MealType;
//! use meal_planner::ollama_client::OllamaClient;
//! use meal_planner::recipe_synthesizer::{RecipeRequest, RecipeSynthesizer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GeneratorConfig::default();
//! let synthesizer = RecipeSynthesizer::new(Arc::new(OllamaClient::new(&config)?), &config.model);
//!
//! let request = RecipeRequest::new(MealType::Breakfast, "Indian", "chicken", MacroGoals::new(500, 25, 45, 20), 30);
//! let recipe = synthesizer.synthesize(&request).await;
//! println!("{} ({} min)", recipe.name, recipe.total_time());
//! # Ok(())
//! # }
//! ```

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{MacroGoals, UserPreferences};
use crate::fallback_recipes::FallbackTable;
use crate::meal_model::{Ingredient, MealType, NutritionInfo, Recipe, TAG_AI_GENERATED};
use crate::ollama_client::{SamplingOptions, TextGenerator};
use crate::planner_errors::{GenerationError, ValidationError};
use crate::response_repair::{repair_response, RawRecipe};

// Defaults applied when a parsed reply omits a field
const DEFAULT_PREP_TIME: u32 = 15;
const DEFAULT_COOK_TIME: u32 = 15;
const DEFAULT_SERVINGS: u32 = 1;

/// Constraints for one generated recipe
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRequest {
    pub meal_type: MealType,
    pub cuisine: String,
    pub preferred_protein: String,
    /// Targets for this meal alone
    pub macro_goals: MacroGoals,
    /// minutes
    pub max_prep_time: u32,
    pub dietary_restrictions: Vec<String>,
}

impl RecipeRequest {
    pub fn new(
        meal_type: MealType,
        cuisine: &str,
        preferred_protein: &str,
        macro_goals: MacroGoals,
        max_prep_time: u32,
    ) -> Self {
        Self {
            meal_type,
            cuisine: cuisine.to_string(),
            preferred_protein: preferred_protein.to_string(),
            macro_goals,
            max_prep_time,
            dietary_restrictions: Vec::new(),
        }
    }

    /// Request for one slot built from the user's preferences and that slot's goals
    pub fn for_slot(meal_type: MealType, preferences: &UserPreferences, macro_goals: MacroGoals) -> Self {
        Self {
            dietary_restrictions: preferences.dietary_restrictions.clone(),
            ..Self::new(
                meal_type,
                &preferences.cuisine,
                &preferences.preferred_protein,
                macro_goals,
                preferences.max_prep_time,
            )
        }
    }
}

/// Generates recipes and absorbs every generation failure
pub struct RecipeSynthesizer {
    generator: Arc<dyn TextGenerator>,
    model: String,
    sampling: SamplingOptions,
    fallbacks: FallbackTable,
}

impl RecipeSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, model: &str) -> Self {
        Self {
            generator,
            model: model.to_string(),
            sampling: SamplingOptions::recipe(),
            fallbacks: FallbackTable::builtin(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackTable) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Produce a recipe for the request; never fails.
    pub async fn synthesize(&self, request: &RecipeRequest) -> Recipe {
        match self.try_generate(request).await {
            Ok(recipe) => {
                info!(
                    meal_type = %request.meal_type,
                    name = %recipe.name,
                    ingredients = recipe.ingredients.len(),
                    "Generated recipe"
                );
                recipe
            }
            Err(e) => {
                warn!(
                    meal_type = %request.meal_type,
                    cuisine = %request.cuisine,
                    error = %e,
                    "Recipe generation failed, using fallback recipe"
                );
                self.fallback_recipe(request)
            }
        }
    }

    /// The generation path without containment
    pub async fn try_generate(&self, request: &RecipeRequest) -> Result<Recipe, GenerationError> {
        let prompt = build_prompt(request);
        debug!(meal_type = %request.meal_type, model = %self.model, "Requesting recipe text");

        let text = self
            .generator
            .generate(&self.model, &prompt, &self.sampling)
            .await?;
        let raw = repair_response(&text)?;
        debug!(stage = ?raw.stage, "Recovered recipe fields");

        recipe_from_raw(&raw, request.meal_type, &request.cuisine).map_err(GenerationError::from)
    }

    pub fn fallback_recipe(&self, request: &RecipeRequest) -> Recipe {
        self.fallbacks
            .recipe_for(request.meal_type, &request.cuisine, &request.preferred_protein)
    }
}

/// Render the generation prompt, including the JSON shape the repair pipeline expects
pub fn build_prompt(request: &RecipeRequest) -> String {
    let goals = &request.macro_goals;
    let restrictions = if request.dietary_restrictions.is_empty() {
        String::new()
    } else {
        format!("- Dietary restrictions: {}\n", request.dietary_restrictions.join(", "))
    };

    format!(
        r#"You are a professional chef and nutritionist. Create a detailed recipe in JSON format for a {meal_type} meal.

Requirements:
- Cuisine: {cuisine}
- Preferred protein: {protein}
- Maximum preparation time: {max_prep_time} minutes
- Nutritional goals: {calories} calories, {goal_protein}g protein, {carbs}g carbs, {fat}g fat
{restrictions}- Must be healthy and balanced
- Include detailed step-by-step instructions
- List all ingredients with exact amounts and units

Return ONLY a valid JSON object with this exact structure:
{{
    "name": "Recipe Name",
    "prep_time": 15,
    "cook_time": 20,
    "servings": 1,
    "ingredients": [
        {{"name": "ingredient name", "amount": 1.0, "unit": "cup", "category": "protein"}}
    ],
    "instructions": [
        "Step 1: ...",
        "Step 2: ..."
    ],
    "nutrition": {{
        "calories": 500,
        "protein": 25.0,
        "carbs": 45.0,
        "fat": 20.0
    }}
}}

Make sure the recipe is authentic to {cuisine} cuisine and uses {protein} as the main protein source.
"#,
        meal_type = request.meal_type,
        cuisine = request.cuisine,
        protein = request.preferred_protein,
        max_prep_time = request.max_prep_time,
        calories = goals.calories,
        goal_protein = goals.protein,
        carbs = goals.carbs,
        fat = goals.fat,
    )
}

/// Coerce recovered fields into a recipe.
///
/// Cuisine and meal type come from the request; tags are always
/// `[cuisine, meal_type, "ai-generated"]` whatever the model emitted.
pub fn recipe_from_raw(
    raw: &RawRecipe,
    meal_type: MealType,
    cuisine: &str,
) -> Result<Recipe, ValidationError> {
    let name = match raw.get("name") {
        None | Some(Value::Null) => format!("{cuisine} {meal_type}"),
        Some(value) => coerce_string(value, "name")?,
    };
    let prep_time = optional_u32(raw.get("prep_time"), "prep_time")?.unwrap_or(DEFAULT_PREP_TIME);
    let cook_time = optional_u32(raw.get("cook_time"), "cook_time")?.unwrap_or(DEFAULT_COOK_TIME);
    let servings = optional_u32(raw.get("servings"), "servings")?.unwrap_or(DEFAULT_SERVINGS);
    if servings == 0 {
        return Err(ValidationError::new("servings", "must be at least 1"));
    }

    let ingredients = match raw.get("ingredients") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| coerce_ingredient(item, index))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(ValidationError::new("ingredients", "expected an array")),
    };

    let instructions = match raw.get("instructions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(steps)) => steps
            .iter()
            .enumerate()
            .map(|(index, step)| coerce_string(step, &format!("instructions[{index}]")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(ValidationError::new("instructions", "expected an array")),
    };

    let nutrition = match raw.get("nutrition") {
        None | Some(Value::Null) => NutritionInfo::zero(),
        Some(Value::Object(fields)) => coerce_nutrition(fields)?,
        Some(_) => return Err(ValidationError::new("nutrition", "expected an object")),
    };

    let tags = vec![
        cuisine.to_string(),
        meal_type.to_string(),
        TAG_AI_GENERATED.to_string(),
    ];

    Ok(Recipe::new(&name, cuisine, meal_type)
        .with_times(prep_time, cook_time)
        .with_servings(servings)
        .with_ingredients(ingredients)
        .with_instructions(instructions)
        .with_nutrition(nutrition)
        .with_tags(tags))
}

fn coerce_ingredient(value: &Value, index: usize) -> Result<Ingredient, ValidationError> {
    let path = |field: &str| format!("ingredients[{index}].{field}");
    let fields = value
        .as_object()
        .ok_or_else(|| ValidationError::new(format!("ingredients[{index}]"), "expected an object"))?;

    let required = |field: &str| {
        fields
            .get(field)
            .filter(|value| !value.is_null())
            .ok_or_else(|| ValidationError::new(path(field), "missing"))
    };

    let name = coerce_string(required("name")?, &path("name"))?;
    let amount = coerce_f64(required("amount")?, &path("amount"))?;
    let unit = coerce_string(required("unit")?, &path("unit"))?;
    let category = match fields.get("category") {
        None | Some(Value::Null) => String::new(),
        Some(value) => coerce_string(value, &path("category"))?,
    };

    Ok(Ingredient::new(&name, amount, &unit).with_category(&category))
}

fn coerce_nutrition(fields: &Map<String, Value>) -> Result<NutritionInfo, ValidationError> {
    let decimal = |key: &str| -> Result<Option<f64>, ValidationError> {
        match fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => coerce_f64(value, &format!("nutrition.{key}")).map(Some),
        }
    };

    let calories = optional_u32(fields.get("calories"), "nutrition.calories")?.unwrap_or(0);
    let mut nutrition = NutritionInfo::new(
        calories,
        decimal("protein")?.unwrap_or(0.0),
        decimal("carbs")?.unwrap_or(0.0),
        decimal("fat")?.unwrap_or(0.0),
    );
    nutrition.fiber = decimal("fiber")?;
    nutrition.sugar = decimal("sugar")?;
    nutrition.sodium = decimal("sodium")?;

    Ok(nutrition)
}

fn coerce_string(value: &Value, field: &str) -> Result<String, ValidationError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(ValidationError::new(field, "expected a string")),
    }
}

/// Non-negative real from a number or a purely numeric string
fn coerce_f64(value: &Value, field: &str) -> Result<f64, ValidationError> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
    .ok_or_else(|| ValidationError::new(field, format!("'{value}' is not a number")))?;

    if number < 0.0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(number)
}

/// Whole minutes/counts; fractional values are truncated
fn optional_u32(value: Option<&Value>, field: &str) -> Result<Option<u32>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let number = coerce_f64(value, field)?;
            if number > f64::from(u32::MAX) {
                return Err(ValidationError::new(field, "out of range"));
            }
            Ok(Some(number as u32))
        }
    }
}
