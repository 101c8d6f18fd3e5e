use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campo_core::{FarmId, LotId};

/// A lot (paddock): a fenced grazing unit belonging to one farm.
///
/// `module_name` tells apart lots that share a display name across different
/// pasture-rotation modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub farm_id: FarmId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    /// Last time the lot was left without any stock entry.
    #[serde(default)]
    pub last_destocked_at: Option<DateTime<Utc>>,
}

impl Lot {
    pub fn new(farm_id: FarmId, name: impl Into<String>) -> Self {
        Self {
            id: LotId::new(),
            farm_id,
            name: name.into(),
            module_name: None,
            last_destocked_at: None,
        }
    }

    pub fn with_module(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    /// Name shown to users, qualified by module when the lot belongs to one.
    pub fn display_name(&self) -> String {
        match &self.module_name {
            Some(module) if !module.trim().is_empty() => format!("{} ({})", self.name, module),
            _ => self.name.clone(),
        }
    }

    /// Whole days the paddock has been resting since it was last fully destocked.
    ///
    /// This is the pasture-rotation counter the movement guard protects.
    pub fn rest_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_destocked_at
            .map(|destocked_at| (now - destocked_at).num_days().max(0))
    }
}
