//! # Fallback Recipes Module
//!
//! Statically authored recipes substituted when generation cannot produce a usable
//! result. The built-in table ships with the crate (`fallback_recipes.json`) and
//! covers every meal slot of the default cuisine; entries may reference the
//! preferred protein through `{protein}` / `{Protein}` placeholders.

use lazy_static::lazy_static;
use serde::Deserialize;
use tracing::debug;

use crate::meal_model::{Ingredient, MealType, NutritionInfo, Recipe, TAG_FALLBACK};

/// Timing used for every substituted recipe
pub const FALLBACK_PREP_TIME: u32 = 15;
pub const FALLBACK_COOK_TIME: u32 = 20;

const BUILTIN_TABLE: &str = include_str!("fallback_recipes.json");

lazy_static! {
    static ref BUILTIN_ENTRIES: Vec<FallbackEntry> =
        serde_json::from_str(BUILTIN_TABLE).expect("Built-in fallback table should be valid JSON");
}

/// One statically authored recipe
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackEntry {
    pub meal_type: MealType,
    pub cuisine: String,
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    #[serde(default)]
    pub nutrition: NutritionInfo,
}

/// Fallback recipes keyed by `(meal_type, cuisine)`
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTable {
    entries: Vec<FallbackEntry>,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackTable {
    /// The table shipped with the crate
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_ENTRIES.clone(),
        }
    }

    pub fn new(entries: Vec<FallbackEntry>) -> Self {
        Self { entries }
    }

    /// Load a table from a JSON array of entries
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a slot and cuisine; cuisine matching ignores ASCII case
    pub fn lookup(&self, meal_type: MealType, cuisine: &str) -> Option<&FallbackEntry> {
        self.entries
            .iter()
            .find(|entry| entry.meal_type == meal_type && entry.cuisine.eq_ignore_ascii_case(cuisine))
    }

    /// Build the substitute recipe for a slot.
    ///
    /// Without a table entry this is an empty placeholder named
    /// `"{cuisine} {meal_type}"` with zero nutrition.
    pub fn recipe_for(&self, meal_type: MealType, cuisine: &str, preferred_protein: &str) -> Recipe {
        let tags = vec![
            cuisine.to_string(),
            meal_type.to_string(),
            TAG_FALLBACK.to_string(),
        ];
        let base = Recipe::new(&format!("{cuisine} {meal_type}"), cuisine, meal_type)
            .with_times(FALLBACK_PREP_TIME, FALLBACK_COOK_TIME)
            .with_tags(tags);

        match self.lookup(meal_type, cuisine) {
            Some(entry) => {
                debug!(meal_type = %meal_type, cuisine = %cuisine, name = %entry.name, "Using fallback table entry");
                let fill = |text: &str| fill_protein(text, preferred_protein);
                Recipe {
                    name: fill(&entry.name),
                    ingredients: entry
                        .ingredients
                        .iter()
                        .map(|ingredient| Ingredient {
                            name: fill(&ingredient.name),
                            ..ingredient.clone()
                        })
                        .collect(),
                    instructions: entry.instructions.iter().map(|step| fill(step)).collect(),
                    nutrition: entry.nutrition.clone(),
                    ..base
                }
            }
            None => {
                debug!(meal_type = %meal_type, cuisine = %cuisine, "No fallback entry, using placeholder");
                base
            }
        }
    }
}

fn fill_protein(text: &str, protein: &str) -> String {
    text.replace("{Protein}", &title_case(protein))
        .replace("{protein}", protein)
}

/// Capitalize the first letter of every word, lowercase the rest
fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
