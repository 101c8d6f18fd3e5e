use serde::{Deserialize, Serialize};

use campo_core::DomainError;

/// Species an animal category belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Cattle,
    Sheep,
    Horse,
    Pig,
    Goat,
    Other,
}

impl Species {
    pub fn as_str(self) -> &'static str {
        match self {
            Species::Cattle => "cattle",
            Species::Sheep => "sheep",
            Species::Horse => "horse",
            Species::Pig => "pig",
            Species::Goat => "goat",
            Species::Other => "other",
        }
    }
}

impl std::str::FromStr for Species {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cattle" => Ok(Species::Cattle),
            "sheep" => Ok(Species::Sheep),
            "horse" => Ok(Species::Horse),
            "pig" => Ok(Species::Pig),
            "goat" => Ok(Species::Goat),
            "other" => Ok(Species::Other),
            other => Err(DomainError::validation(format!("unknown species: {other}"))),
        }
    }
}

/// An entry of the farm's canonical category vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub singular_name: String,
    pub plural_name: String,
    pub species: Species,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CategoryDefinition {
    pub fn new(singular: impl Into<String>, plural: impl Into<String>, species: Species) -> Self {
        Self {
            singular_name: singular.into(),
            plural_name: plural.into(),
            species,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Label written into stock entries and offered as a suggestion.
    pub fn label(&self) -> &str {
        if self.plural_name.trim().is_empty() {
            &self.singular_name
        } else {
            &self.plural_name
        }
    }

    /// Both surface names, skipping blanks.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [self.singular_name.as_str(), self.plural_name.as_str()]
            .into_iter()
            .filter(|n| !n.trim().is_empty())
    }
}
