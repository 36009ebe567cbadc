//! # Meal Planner
//!
//! Daily meal planning with a local LLM. Recipes are requested from an Ollama
//! server, recovered from whatever near-JSON the model returns, validated into
//! typed recipes (with static fallbacks when generation fails) and assembled into
//! daily plans and consolidated grocery lists.

pub mod cli;
pub mod config;
pub mod db;
pub mod fallback_recipes;
pub mod json_patterns;
pub mod meal_model;
pub mod ollama_client;
pub mod plan_assembler;
pub mod planner_errors;
pub mod recipe_synthesizer;
pub mod response_repair;
