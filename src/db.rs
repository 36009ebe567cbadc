//! # Recipe Storage Module
//!
//! Persistence for generated recipes, daily plans and grocery lists behind the
//! [`RecipeStore`] trait. [`PgRecipeStore`] keeps everything in PostgreSQL;
//! [`MemoryRecipeStore`] keeps it in process for tests and offline runs.
//!
//! Plans reference their recipes by id, so saving a plan saves its recipes first.
//! Plans and grocery lists are unique per date; saving again replaces them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::meal_model::{Ingredient, MealPlan, MealType, NutritionInfo, Recipe};
use crate::planner_errors::StoreError;

/// Filter for stored recipes; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeCriteria {
    pub cuisine: Option<String>,
    pub meal_type: Option<MealType>,
    /// minutes, inclusive
    pub max_prep_time: Option<u32>,
}

impl RecipeCriteria {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        self.cuisine.as_ref().map_or(true, |cuisine| &recipe.cuisine == cuisine)
            && self.meal_type.map_or(true, |meal_type| recipe.meal_type == meal_type)
            && self
                .max_prep_time
                .map_or(true, |max| recipe.prep_time <= max)
    }
}

/// Storage capability used by the planner
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Store a recipe and return its id
    async fn save_recipe(&self, recipe: &Recipe) -> Result<i64, StoreError>;

    async fn get_recipe(&self, id: i64) -> Result<Option<Recipe>, StoreError>;

    /// Stored recipes matching the criteria, oldest first
    async fn recipes_by_criteria(&self, criteria: &RecipeCriteria) -> Result<Vec<Recipe>, StoreError>;

    /// Store (or replace) the plan for its date and return the plan id
    async fn save_plan(&self, plan: &MealPlan) -> Result<i64, StoreError>;

    async fn get_plan(&self, date: NaiveDate) -> Result<Option<MealPlan>, StoreError>;

    /// Store (or replace) the grocery list for a date
    async fn save_grocery_list(&self, date: NaiveDate, items: &[Ingredient]) -> Result<(), StoreError>;

    /// The grocery list for a date, empty when none was saved
    async fn get_grocery_list(&self, date: NaiveDate) -> Result<Vec<Ingredient>, StoreError>;
}

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the tables if they do not exist yet
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        info!("Initializing recipe store schema...");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS recipes (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                cuisine TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                prep_time BIGINT NOT NULL,
                cook_time BIGINT NOT NULL,
                servings BIGINT NOT NULL DEFAULT 1,
                ingredients TEXT NOT NULL,
                instructions TEXT NOT NULL,
                nutrition TEXT NOT NULL,
                tags TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS meal_plans (
                id BIGSERIAL PRIMARY KEY,
                date DATE NOT NULL UNIQUE,
                breakfast_recipe_id BIGINT REFERENCES recipes(id),
                lunch_recipe_id BIGINT REFERENCES recipes(id),
                dinner_recipe_id BIGINT REFERENCES recipes(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS grocery_lists (
                id BIGSERIAL PRIMARY KEY,
                date DATE NOT NULL UNIQUE,
                ingredients TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_recipes_cuisine_meal ON recipes(cuisine, meal_type)")
            .execute(&self.pool)
            .await?;

        info!("Recipe store schema initialized successfully");
        Ok(())
    }

    async fn save_slot(&self, recipe: Option<&Recipe>) -> Result<Option<i64>, StoreError> {
        match recipe {
            Some(recipe) => Ok(Some(self.save_recipe(recipe).await?)),
            None => Ok(None),
        }
    }

    async fn load_slot(&self, id: Option<i64>) -> Result<Option<Recipe>, StoreError> {
        match id {
            Some(id) => self.get_recipe(id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn save_recipe(&self, recipe: &Recipe) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "INSERT INTO recipes (name, cuisine, meal_type, prep_time, cook_time, servings,
                                  ingredients, instructions, nutrition, tags, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
        )
        .bind(&recipe.name)
        .bind(&recipe.cuisine)
        .bind(recipe.meal_type.as_str())
        .bind(i64::from(recipe.prep_time))
        .bind(i64::from(recipe.cook_time))
        .bind(i64::from(recipe.servings))
        .bind(serde_json::to_string(&recipe.ingredients)?)
        .bind(serde_json::to_string(&recipe.instructions)?)
        .bind(serde_json::to_string(&recipe.nutrition)?)
        .bind(serde_json::to_string(&recipe.tags)?)
        .bind(recipe.created_at)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        debug!(recipe_id = id, name = %recipe.name, "Saved recipe");
        Ok(id)
    }

    async fn get_recipe(&self, id: i64) -> Result<Option<Recipe>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, cuisine, meal_type, prep_time, cook_time, servings,
                    ingredients, instructions, nutrition, tags, created_at
             FROM recipes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_recipe(&row)).transpose()
    }

    async fn recipes_by_criteria(&self, criteria: &RecipeCriteria) -> Result<Vec<Recipe>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, cuisine, meal_type, prep_time, cook_time, servings,
                    ingredients, instructions, nutrition, tags, created_at
             FROM recipes
             WHERE ($1::TEXT IS NULL OR cuisine = $1)
               AND ($2::TEXT IS NULL OR meal_type = $2)
               AND ($3::BIGINT IS NULL OR prep_time <= $3)
             ORDER BY id",
        )
        .bind(criteria.cuisine.as_deref())
        .bind(criteria.meal_type.map(|meal_type| meal_type.as_str()))
        .bind(criteria.max_prep_time.map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Fetched recipes by criteria");
        rows.iter().map(row_to_recipe).collect()
    }

    async fn save_plan(&self, plan: &MealPlan) -> Result<i64, StoreError> {
        let breakfast_id = self.save_slot(plan.breakfast.as_ref()).await?;
        let lunch_id = self.save_slot(plan.lunch.as_ref()).await?;
        let dinner_id = self.save_slot(plan.dinner.as_ref()).await?;

        let row = sqlx::query(
            "INSERT INTO meal_plans (date, breakfast_recipe_id, lunch_recipe_id, dinner_recipe_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (date) DO UPDATE SET
                 breakfast_recipe_id = EXCLUDED.breakfast_recipe_id,
                 lunch_recipe_id = EXCLUDED.lunch_recipe_id,
                 dinner_recipe_id = EXCLUDED.dinner_recipe_id,
                 created_at = CURRENT_TIMESTAMP
             RETURNING id",
        )
        .bind(plan.date)
        .bind(breakfast_id)
        .bind(lunch_id)
        .bind(dinner_id)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        info!(plan_id = id, date = %plan.date, "Saved meal plan");
        Ok(id)
    }

    async fn get_plan(&self, date: NaiveDate) -> Result<Option<MealPlan>, StoreError> {
        let row = sqlx::query(
            "SELECT breakfast_recipe_id, lunch_recipe_id, dinner_recipe_id
             FROM meal_plans WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!(date = %date, "No meal plan stored");
            return Ok(None);
        };

        let mut plan = MealPlan::new(date);
        for (meal_type, column) in [
            (MealType::Breakfast, "breakfast_recipe_id"),
            (MealType::Lunch, "lunch_recipe_id"),
            (MealType::Dinner, "dinner_recipe_id"),
        ] {
            if let Some(recipe) = self.load_slot(row.try_get(column)?).await? {
                plan = plan.with_slot(meal_type, recipe);
            }
        }
        Ok(Some(plan))
    }

    async fn save_grocery_list(&self, date: NaiveDate, items: &[Ingredient]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO grocery_lists (date, ingredients) VALUES ($1, $2)
             ON CONFLICT (date) DO UPDATE SET
                 ingredients = EXCLUDED.ingredients,
                 created_at = CURRENT_TIMESTAMP",
        )
        .bind(date)
        .bind(serde_json::to_string(items)?)
        .execute(&self.pool)
        .await?;

        info!(date = %date, items = items.len(), "Saved grocery list");
        Ok(())
    }

    async fn get_grocery_list(&self, date: NaiveDate) -> Result<Vec<Ingredient>, StoreError> {
        let row = sqlx::query("SELECT ingredients FROM grocery_lists WHERE date = $1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("ingredients")?;
                Ok(serde_json::from_str(&json)?)
            }
            None => Ok(Vec::new()),
        }
    }
}

fn row_to_recipe(row: &PgRow) -> Result<Recipe, StoreError> {
    let id: i64 = row.try_get("id")?;
    let meal_type: String = row.try_get("meal_type")?;
    let meal_type = meal_type
        .parse::<MealType>()
        .map_err(|e| StoreError::Corrupt(format!("recipe {id}: {e}")))?;

    let minutes = |column: &str| -> Result<u32, StoreError> {
        let value: i64 = row.try_get(column)?;
        u32::try_from(value)
            .map_err(|_| StoreError::Corrupt(format!("recipe {id}: {column} out of range ({value})")))
    };

    let ingredients: String = row.try_get("ingredients")?;
    let instructions: String = row.try_get("instructions")?;
    let nutrition: String = row.try_get("nutrition")?;
    let tags: String = row.try_get("tags")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Recipe {
        name: row.try_get("name")?,
        cuisine: row.try_get("cuisine")?,
        meal_type,
        prep_time: minutes("prep_time")?,
        cook_time: minutes("cook_time")?,
        servings: minutes("servings")?,
        ingredients: serde_json::from_str::<Vec<Ingredient>>(&ingredients)?,
        instructions: serde_json::from_str::<Vec<String>>(&instructions)?,
        nutrition: serde_json::from_str::<NutritionInfo>(&nutrition)?,
        tags: serde_json::from_str::<Vec<String>>(&tags)?,
        created_at,
    })
}

#[derive(Debug, Default)]
struct MemoryState {
    recipes: Vec<Recipe>,
    /// date -> (plan id, slot recipe ids)
    plans: HashMap<NaiveDate, (i64, [Option<i64>; 3])>,
    next_plan_id: i64,
    grocery_lists: HashMap<NaiveDate, Vec<Ingredient>>,
}

impl MemoryState {
    fn insert_recipe(&mut self, recipe: &Recipe) -> i64 {
        self.recipes.push(recipe.clone());
        self.recipes.len() as i64
    }

    fn recipe(&self, id: i64) -> Option<&Recipe> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.recipes.get(index))
    }
}

/// In-process store with the same semantics as [`PgRecipeStore`]
#[derive(Debug, Default)]
pub struct MemoryRecipeStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn save_recipe(&self, recipe: &Recipe) -> Result<i64, StoreError> {
        let id = self.state.lock().await.insert_recipe(recipe);
        debug!(recipe_id = id, name = %recipe.name, "Saved recipe in memory");
        Ok(id)
    }

    async fn get_recipe(&self, id: i64) -> Result<Option<Recipe>, StoreError> {
        Ok(self.state.lock().await.recipe(id).cloned())
    }

    async fn recipes_by_criteria(&self, criteria: &RecipeCriteria) -> Result<Vec<Recipe>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .recipes
            .iter()
            .filter(|recipe| criteria.matches(recipe))
            .cloned()
            .collect())
    }

    async fn save_plan(&self, plan: &MealPlan) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        let slots = MealType::ALL.map(|meal_type| plan.slot(meal_type).map(|recipe| state.insert_recipe(recipe)));

        let existing = state.plans.get(&plan.date).map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                state.next_plan_id += 1;
                state.next_plan_id
            }
        };
        state.plans.insert(plan.date, (id, slots));
        debug!(plan_id = id, date = %plan.date, "Saved meal plan in memory");
        Ok(id)
    }

    async fn get_plan(&self, date: NaiveDate) -> Result<Option<MealPlan>, StoreError> {
        let state = self.state.lock().await;
        let Some((_, slots)) = state.plans.get(&date) else {
            return Ok(None);
        };

        let mut plan = MealPlan::new(date);
        for (meal_type, id) in MealType::ALL.into_iter().zip(slots.iter()) {
            if let Some(recipe) = id.and_then(|id| state.recipe(id)) {
                plan = plan.with_slot(meal_type, recipe.clone());
            }
        }
        Ok(Some(plan))
    }

    async fn save_grocery_list(&self, date: NaiveDate, items: &[Ingredient]) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .grocery_lists
            .insert(date, items.to_vec());
        Ok(())
    }

    async fn get_grocery_list(&self, date: NaiveDate) -> Result<Vec<Ingredient>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .grocery_lists
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str, cuisine: &str, meal_type: MealType, prep_time: u32) -> Recipe {
        Recipe::new(name, cuisine, meal_type)
            .with_times(prep_time, 10)
            .with_ingredients(vec![Ingredient::new("rice", 1.0, "cup")])
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[tokio::test]
    async fn test_memory_recipe_round_trip() {
        let store = MemoryRecipeStore::new();
        let saved = recipe("Khichdi", "Indian", MealType::Dinner, 10);

        let id = store.save_recipe(&saved).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.get_recipe(id).await.unwrap(), Some(saved));
        assert_eq!(store.get_recipe(0).await.unwrap(), None);
        assert_eq!(store.get_recipe(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_criteria() {
        let store = MemoryRecipeStore::new();
        store.save_recipe(&recipe("Poha", "Indian", MealType::Breakfast, 10)).await.unwrap();
        store.save_recipe(&recipe("Biryani", "Indian", MealType::Dinner, 45)).await.unwrap();
        store.save_recipe(&recipe("Falafel", "Mediterranean", MealType::Lunch, 20)).await.unwrap();

        let all = store.recipes_by_criteria(&RecipeCriteria::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let quick_indian = RecipeCriteria {
            cuisine: Some("Indian".to_string()),
            max_prep_time: Some(30),
            ..RecipeCriteria::default()
        };
        let found = store.recipes_by_criteria(&quick_indian).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Poha");

        let lunches = RecipeCriteria {
            meal_type: Some(MealType::Lunch),
            ..RecipeCriteria::default()
        };
        assert_eq!(store.recipes_by_criteria(&lunches).await.unwrap()[0].name, "Falafel");
    }

    #[tokio::test]
    async fn test_memory_plan_upsert() {
        let store = MemoryRecipeStore::new();
        let first = MealPlan::new(date(1)).with_slot(MealType::Lunch, recipe("Dal", "Indian", MealType::Lunch, 5));
        let second = MealPlan::new(date(1))
            .with_slot(MealType::Breakfast, recipe("Upma", "Indian", MealType::Breakfast, 10));

        let id = store.save_plan(&first).await.unwrap();
        assert_eq!(store.save_plan(&second).await.unwrap(), id);

        let loaded = store.get_plan(date(1)).await.unwrap().unwrap();
        assert_eq!(loaded.breakfast.unwrap().name, "Upma");
        assert!(loaded.lunch.is_none());
        assert!(store.get_plan(date(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_grocery_list() {
        let store = MemoryRecipeStore::new();
        assert!(store.get_grocery_list(date(3)).await.unwrap().is_empty());

        let items = vec![Ingredient::new("onion", 2.0, "pieces")];
        store.save_grocery_list(date(3), &items).await.unwrap();
        store.save_grocery_list(date(3), &items).await.unwrap();
        assert_eq!(store.get_grocery_list(date(3)).await.unwrap(), items);
    }
}
