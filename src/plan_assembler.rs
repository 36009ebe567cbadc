//! # Plan Assembler Module
//!
//! Builds a full day of meals from the user's goals and preferences. The day's
//! macro goals are split across the slots (25% breakfast, 35% lunch, 40% dinner)
//! and the three recipes are synthesized concurrently; the plan is only built
//! once all of them have resolved.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::config::{MacroGoals, UserPreferences};
use crate::db::RecipeStore;
use crate::meal_model::{Ingredient, MealPlan, MealType};
use crate::recipe_synthesizer::{RecipeRequest, RecipeSynthesizer};

pub struct PlanAssembler {
    synthesizer: RecipeSynthesizer,
    goals: MacroGoals,
    preferences: UserPreferences,
}

impl PlanAssembler {
    pub fn new(synthesizer: RecipeSynthesizer, goals: MacroGoals, preferences: UserPreferences) -> Self {
        Self {
            synthesizer,
            goals,
            preferences,
        }
    }

    /// Request for one slot, carrying that slot's share of the daily goals
    pub fn slot_request(&self, meal_type: MealType) -> RecipeRequest {
        RecipeRequest::for_slot(meal_type, &self.preferences, self.goals.split(meal_type))
    }

    /// Generate a complete plan for `date`; every slot is always filled
    pub async fn assemble(&self, date: NaiveDate) -> MealPlan {
        info!(date = %date, cuisine = %self.preferences.cuisine, "Assembling meal plan");

        let breakfast = self.slot_request(MealType::Breakfast);
        let lunch = self.slot_request(MealType::Lunch);
        let dinner = self.slot_request(MealType::Dinner);

        let (breakfast, lunch, dinner) = tokio::join!(
            self.synthesizer.synthesize(&breakfast),
            self.synthesizer.synthesize(&lunch),
            self.synthesizer.synthesize(&dinner),
        );

        let plan = MealPlan::new(date)
            .with_slot(MealType::Breakfast, breakfast)
            .with_slot(MealType::Lunch, lunch)
            .with_slot(MealType::Dinner, dinner);

        info!(
            date = %date,
            calories = plan.total_nutrition().calories,
            total_time = plan.total_time(),
            "Meal plan assembled"
        );
        plan
    }

    /// Generate a plan and hand it to the store
    pub async fn assemble_and_store(&self, date: NaiveDate, store: &dyn RecipeStore) -> Result<MealPlan> {
        let plan = self.assemble(date).await;
        store
            .save_plan(&plan)
            .await
            .with_context(|| format!("Failed to save meal plan for {date}"))?;
        Ok(plan)
    }

    /// The consolidated grocery list for `date`.
    ///
    /// Uses the stored plan for that date, assembling and storing one first if
    /// there is none, then saves the list.
    pub async fn grocery_list_for(&self, date: NaiveDate, store: &dyn RecipeStore) -> Result<Vec<Ingredient>> {
        let stored = store
            .get_plan(date)
            .await
            .with_context(|| format!("Failed to load meal plan for {date}"))?;

        let plan = match stored {
            Some(plan) => plan,
            None => {
                info!(date = %date, "No stored plan, generating one for the grocery list");
                self.assemble_and_store(date, store).await?
            }
        };

        let items = grocery_list(&plan);
        store
            .save_grocery_list(date, &items)
            .await
            .with_context(|| format!("Failed to save grocery list for {date}"))?;

        info!(date = %date, items = items.len(), "Grocery list ready");
        Ok(items)
    }
}

/// Ingredients of every present slot, merged by `(name, unit)` in first-seen order
pub fn grocery_list(plan: &MealPlan) -> Vec<Ingredient> {
    plan.grocery_list()
}
