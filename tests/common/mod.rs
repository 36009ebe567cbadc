//! Shared helpers for integration tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use meal_planner::ollama_client::{SamplingOptions, TextGenerator};
use meal_planner::planner_errors::CapabilityError;

/// What the fake generator answers
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Timeout,
    Unavailable,
}

/// A `TextGenerator` answering from a script keyed on the prompt
pub struct ScriptedGenerator {
    script: Box<dyn Fn(&str) -> Reply + Send + Sync>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedGenerator {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text
    pub fn always(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Reply::Text(text.clone()))
    }

    /// Always fails like an unreachable server
    pub fn failing() -> Self {
        Self::new(|_| Reply::Unavailable)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _options: &SamplingOptions,
    ) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        match (self.script)(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Timeout => Err(CapabilityError::Timeout),
            Reply::Unavailable => Err(CapabilityError::MalformedEnvelope(
                "connection refused".to_string(),
            )),
        }
    }
}

/// A well-formed model reply for a recipe
#[allow(dead_code)]
pub fn recipe_reply(name: &str, calories: u32, ingredients: &str) -> String {
    format!(
        r#"Here is your recipe:
{{
    "name": "{name}",
    "prep_time": 10,
    "cook_time": 20,
    "servings": 1,
    "ingredients": [{ingredients}],
    "instructions": ["Prepare", "Cook", "Serve"],
    "nutrition": {{"calories": {calories}, "protein": 30.0, "carbs": 40.0, "fat": 15.0}}
}}
Enjoy!"#
    )
}
