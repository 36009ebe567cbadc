//! # Plan Assembler Tests
//!
//! Daily plan assembly, per-slot goal splitting and grocery list derivation
//! against a scripted generator and the in-memory store.

mod common;

use chrono::NaiveDate;
use common::{recipe_reply, Reply, ScriptedGenerator};
use meal_planner::config::{MacroGoals, UserPreferences};
use meal_planner::db::{MemoryRecipeStore, RecipeCriteria, RecipeStore};
use meal_planner::meal_model::MealType;
use meal_planner::plan_assembler::{grocery_list, PlanAssembler};
use meal_planner::recipe_synthesizer::RecipeSynthesizer;
use std::sync::Arc;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 14).unwrap()
}

/// Answers each slot with its own recipe; every slot shares "egg" in pieces
fn slot_script(prompt: &str) -> Reply {
    let reply = if prompt.contains("for a breakfast meal") {
        recipe_reply(
            "Egg Paratha",
            450,
            r#"{"name": "egg", "amount": 2, "unit": "pieces", "category": "protein"},
               {"name": "flour", "amount": 1, "unit": "cup", "category": "grain"}"#,
        )
    } else if prompt.contains("for a lunch meal") {
        recipe_reply(
            "Egg Curry",
            650,
            r#"{"name": "egg", "amount": 3, "unit": "pieces", "category": "protein"},
               {"name": "rice", "amount": 0.75, "unit": "cup", "category": "grain"}"#,
        )
    } else {
        recipe_reply(
            "Chicken Biryani",
            780,
            r#"{"name": "chicken", "amount": 200, "unit": "grams", "category": "protein"},
               {"name": "egg", "amount": 50, "unit": "grams", "category": "protein"},
               {"name": "rice", "amount": 1, "unit": "cup", "category": "grain"}"#,
        )
    };
    Reply::Text(reply)
}

fn assembler(generator: Arc<ScriptedGenerator>) -> PlanAssembler {
    PlanAssembler::new(
        RecipeSynthesizer::new(generator, "llama3.2:latest"),
        MacroGoals::default(),
        UserPreferences::default(),
    )
}

#[tokio::test]
async fn test_assemble_fills_every_slot() {
    let generator = Arc::new(ScriptedGenerator::new(slot_script));
    let plan = assembler(generator.clone()).assemble(date()).await;

    assert_eq!(plan.date, date());
    assert!(plan.is_complete());
    assert_eq!(generator.calls(), 3);
    assert_eq!(plan.breakfast.as_ref().unwrap().name, "Egg Paratha");
    assert_eq!(plan.lunch.as_ref().unwrap().name, "Egg Curry");
    assert_eq!(plan.dinner.as_ref().unwrap().name, "Chicken Biryani");

    let slot_calories: u32 = plan.recipes().iter().map(|recipe| recipe.nutrition.calories).sum();
    assert_eq!(plan.total_nutrition().calories, slot_calories);
    assert_eq!(slot_calories, 1880);
}

#[tokio::test]
async fn test_each_slot_gets_its_share_of_the_goals() {
    let generator = Arc::new(ScriptedGenerator::new(slot_script));
    assembler(generator.clone()).assemble(date()).await;

    let prompts = generator.prompts();
    let prompt_for = |meal: &str| {
        prompts
            .iter()
            .find(|prompt| prompt.contains(&format!("for a {meal} meal")))
            .cloned()
            .unwrap()
    };

    assert!(prompt_for("breakfast").contains("500 calories, 37g protein, 45g carbs, 15g fat"));
    assert!(prompt_for("lunch").contains("700 calories, 52g protein, 62g carbs, 21g fat"));
    assert!(prompt_for("dinner").contains("800 calories, 60g protein, 72g carbs, 24g fat"));
}

#[tokio::test]
async fn test_failed_slots_are_filled_with_fallbacks() {
    let generator = Arc::new(ScriptedGenerator::new(|prompt| {
        if prompt.contains("for a lunch meal") {
            Reply::Unavailable
        } else {
            slot_script(prompt)
        }
    }));
    let plan = assembler(generator).assemble(date()).await;

    assert!(plan.is_complete());
    let lunch = plan.slot(MealType::Lunch).unwrap();
    assert!(lunch.is_fallback());
    assert_eq!(lunch.name, "Chicken Curry with Rice");
    assert!(!plan.slot(MealType::Breakfast).unwrap().is_fallback());
}

#[tokio::test]
async fn test_grocery_list_consolidates_by_name_and_unit() {
    let generator = Arc::new(ScriptedGenerator::new(slot_script));
    let plan = assembler(generator).assemble(date()).await;

    let items = grocery_list(&plan);
    let names: Vec<(&str, &str)> = items
        .iter()
        .map(|item| (item.name.as_str(), item.unit.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("egg", "pieces"),
            ("flour", "cup"),
            ("rice", "cup"),
            ("chicken", "grams"),
            ("egg", "grams"),
        ]
    );
    assert_eq!(items[0].amount, 5.0);
    assert_eq!(items[2].amount, 1.75);
    assert_eq!(items[4].amount, 50.0);
}

#[tokio::test]
async fn test_grocery_list_for_reuses_stored_plan() {
    let generator = Arc::new(ScriptedGenerator::new(slot_script));
    let assembler = assembler(generator.clone());
    let store = MemoryRecipeStore::new();

    let first = assembler.grocery_list_for(date(), &store).await.unwrap();
    assert_eq!(generator.calls(), 3);
    assert!(store.get_plan(date()).await.unwrap().is_some());
    assert_eq!(store.get_grocery_list(date()).await.unwrap(), first);

    let second = assembler.grocery_list_for(date(), &store).await.unwrap();
    assert_eq!(generator.calls(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_assemble_and_store_persists_recipes() {
    let generator = Arc::new(ScriptedGenerator::new(slot_script));
    let store = MemoryRecipeStore::new();

    let plan = assembler(generator).assemble_and_store(date(), &store).await.unwrap();

    assert_eq!(store.get_plan(date()).await.unwrap(), Some(plan));
    let dinners = RecipeCriteria {
        meal_type: Some(MealType::Dinner),
        ..RecipeCriteria::default()
    };
    let stored = store.recipes_by_criteria(&dinners).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Chicken Biryani");
}
