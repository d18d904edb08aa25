// Entity domain models
use serde::{Deserialize, Serialize};

/// Identifier of the monitored entity a dialog edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn device(id: impl Into<String>) -> Self {
        Self::new("DEVICE", id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    pub name: String,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
