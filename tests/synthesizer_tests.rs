//! # Recipe Synthesizer Tests
//!
//! End-to-end behaviour of recipe synthesis against a scripted text generator:
//! generated recipes, partial salvage, and fallback substitution on every kind
//! of failure.

mod common;

use common::{recipe_reply, Reply, ScriptedGenerator};
use meal_planner::config::MacroGoals;
use meal_planner::fallback_recipes::FallbackTable;
use meal_planner::meal_model::MealType;
use meal_planner::planner_errors::{CapabilityError, GenerationError};
use meal_planner::recipe_synthesizer::{RecipeRequest, RecipeSynthesizer};
use std::sync::Arc;

fn breakfast_request() -> RecipeRequest {
    RecipeRequest::new(
        MealType::Breakfast,
        "Indian",
        "chicken",
        MacroGoals::new(500, 25, 45, 20),
        30,
    )
}

fn synthesizer(generator: ScriptedGenerator) -> (RecipeSynthesizer, Arc<ScriptedGenerator>) {
    let generator = Arc::new(generator);
    (RecipeSynthesizer::new(generator.clone(), "llama3.2:latest"), generator)
}

#[tokio::test]
async fn test_capability_failure_uses_indian_breakfast_fallback() {
    let (synthesizer, generator) = synthesizer(ScriptedGenerator::failing());

    let recipe = synthesizer.synthesize(&breakfast_request()).await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(recipe.name, "Masala Omelette with Toast");
    assert!(recipe.is_fallback());
    assert_eq!(recipe.tags, vec!["Indian", "breakfast", "fallback"]);
    assert_eq!(recipe.prep_time, 15);
    assert_eq!(recipe.cook_time, 20);
}

#[tokio::test]
async fn test_timeout_is_contained() {
    let (synthesizer, _) = synthesizer(ScriptedGenerator::new(|_| Reply::Timeout));

    let err = synthesizer.try_generate(&breakfast_request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Capability(CapabilityError::Timeout)));

    let recipe = synthesizer.synthesize(&breakfast_request()).await;
    assert!(recipe.is_fallback());
}

#[tokio::test]
async fn test_any_text_yields_a_recipe() {
    let replies = [
        "",
        "I'm sorry, I can't help with that.",
        "}{",
        "{",
        "\u{0}\u{1}garbage\u{7f}",
        "[1, 2, 3]",
        "{ totally: not, json ::: }",
    ];

    for reply in replies {
        let (synthesizer, _) = synthesizer(ScriptedGenerator::always(reply));
        let recipe = synthesizer.synthesize(&breakfast_request()).await;
        assert!(!recipe.name.is_empty(), "no recipe for {reply:?}");
        assert_eq!(recipe.meal_type, MealType::Breakfast);
        assert_eq!(recipe.cuisine, "Indian");
    }
}

#[tokio::test]
async fn test_no_json_falls_back() {
    let (synthesizer, _) = synthesizer(ScriptedGenerator::always("Try scrambled eggs!"));

    let err = synthesizer.try_generate(&breakfast_request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Repair(_)));
    assert!(synthesizer.synthesize(&breakfast_request()).await.is_fallback());
}

#[tokio::test]
async fn test_generated_recipe_is_tagged_ai_generated() {
    let reply = recipe_reply(
        "Chicken Poha",
        480,
        r#"{"name": "poha", "amount": 1, "unit": "cup", "category": "grain"},
           {"name": "chicken", "amount": 100, "unit": "grams", "category": "protein"}"#,
    );
    let (synthesizer, generator) = synthesizer(ScriptedGenerator::always(&reply));

    let recipe = synthesizer.synthesize(&breakfast_request()).await;

    assert_eq!(recipe.name, "Chicken Poha");
    assert_eq!(recipe.ingredients.len(), 2);
    assert_eq!(recipe.nutrition.calories, 480);
    assert_eq!(recipe.tags, vec!["Indian", "breakfast", "ai-generated"]);
    assert!(!recipe.is_fallback());

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("500 calories, 25g protein, 45g carbs, 20g fat"));
    assert!(prompt.contains("Maximum preparation time: 30 minutes"));
}

#[tokio::test]
async fn test_near_json_is_repaired() {
    let reply = r#"Sure thing!
```json
{
    name: 'Anda Bhurji',
    prep_time: 5,  // quick
    cook_time: 10,
    ingredients: [
        {name: 'eggs', amount: 3, unit: 'pieces', category: 'protein'},
        {name: 'onion', amount: 0.5, unit: 'cup',},
    ],
    instructions: ['Chop the onion', "Scramble the eggs, don't overcook",],
    /* macros per serving */
    nutrition: {calories: 320, protein: 21, carbs: 8, fat: 22,},
}
```"#;
    let (synthesizer, _) = synthesizer(ScriptedGenerator::always(reply));

    let recipe = synthesizer.try_generate(&breakfast_request()).await.unwrap();

    assert_eq!(recipe.name, "Anda Bhurji");
    assert_eq!((recipe.prep_time, recipe.cook_time), (5, 10));
    assert_eq!(recipe.ingredients[1].name, "onion");
    assert_eq!(recipe.ingredients[1].amount, 0.5);
    assert_eq!(recipe.instructions[1], "Scramble the eggs, don't overcook");
    assert_eq!(recipe.nutrition.calories, 320);
}

#[tokio::test]
async fn test_partial_reply_keeps_salvaged_fields() {
    let reply = r#"{"name": "Chana Masala", "prep_time": 12, "cook_time": 25,
        "ingredients": [{"name": "chickpeas" "amount": 1 "unit": "cup"}, {oops}],
        "instructions": ["Soak", "Simmer"]"#;
    let (synthesizer, _) = synthesizer(ScriptedGenerator::always(&format!("{reply} }}")));

    let recipe = synthesizer.synthesize(&breakfast_request()).await;

    assert_eq!(recipe.name, "Chana Masala");
    assert_eq!(recipe.prep_time, 12);
    assert_eq!(recipe.cook_time, 25);
    assert!(recipe.ingredients.is_empty());
    assert_eq!(recipe.instructions, vec!["Soak", "Simmer"]);
    // Salvage defaults, not the fallback table
    assert_eq!(recipe.nutrition.calories, 500);
    assert!(!recipe.is_fallback());
}

#[tokio::test]
async fn test_unclosed_ingredient_list_keeps_salvaged_fields() {
    let reply = r#"{"name": "Chana Masala", "prep_time": 12, "ingredients": [ {"name": "chickpeas" "amount": 1}, "instructions": ["Soak"], "nutrition": {"calories": 300}}"#;
    let (synthesizer, _) = synthesizer(ScriptedGenerator::always(reply));

    let recipe = synthesizer.try_generate(&breakfast_request()).await.unwrap();

    assert_eq!(recipe.name, "Chana Masala");
    assert_eq!(recipe.prep_time, 12);
    assert!(recipe.ingredients.is_empty());
    assert_eq!(recipe.instructions, vec!["Soak"]);
    assert_eq!(recipe.nutrition.calories, 300);
    assert!(!recipe.is_fallback());
}

#[tokio::test]
async fn test_unit_suffixed_amount_falls_back() {
    let reply = recipe_reply(
        "Dal Tadka",
        450,
        r#"{"name": "lentils", "amount": 100g, "unit": "grams"}"#,
    );
    let (synthesizer, _) = synthesizer(ScriptedGenerator::always(&reply));

    let err = synthesizer.try_generate(&breakfast_request()).await.unwrap_err();
    match err {
        GenerationError::Validation(err) => assert_eq!(err.field, "ingredients[0].amount"),
        other => panic!("expected a validation error, got {other}"),
    }

    let recipe = synthesizer.synthesize(&breakfast_request()).await;
    assert_eq!(recipe.name, "Masala Omelette with Toast");
}

#[tokio::test]
async fn test_missing_table_entry_gives_placeholder() {
    let (synthesizer, _) = synthesizer(ScriptedGenerator::failing());
    let synthesizer = synthesizer.with_fallbacks(FallbackTable::new(Vec::new()));

    let request = RecipeRequest::new(MealType::Lunch, "Peruvian", "fish", MacroGoals::default(), 20);
    let recipe = synthesizer.synthesize(&request).await;

    assert_eq!(recipe.name, "Peruvian lunch");
    assert!(recipe.ingredients.is_empty());
    assert_eq!(recipe.nutrition.calories, 0);
    assert_eq!(recipe.nutrition.protein, 0.0);
    assert!(recipe.is_fallback());
}
