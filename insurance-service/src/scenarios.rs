//! Canned request bodies merged into submissions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InsuranceError, InsuranceResult};

const CATALOG: &str = include_str!("../fixtures/scenarios.json");

/// A test scenario the backend recognises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub index: u32,
    pub label: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub body: Map<String, Value>,
}

impl Scenario {
    /// Load the bundled scenario list
    pub fn catalog() -> InsuranceResult<Vec<Scenario>> {
        Ok(serde_json::from_str(CATALOG)?)
    }

    /// Look up a bundled scenario by index
    pub fn find(index: u32) -> InsuranceResult<Scenario> {
        Self::catalog()?
            .into_iter()
            .find(|scenario| scenario.index == index)
            .ok_or(InsuranceError::UnknownScenario(index))
    }

    /// The scenario preselected on the form
    pub fn default_selection() -> InsuranceResult<Option<Scenario>> {
        Ok(Self::catalog()?.into_iter().find(|scenario| scenario.selected))
    }
}
