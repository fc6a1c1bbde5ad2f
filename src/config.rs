use crate::core::ActorId;
use crate::doc::DEFAULT_CONTENT_KEY;
use crate::editor::Schema;
use crate::error::Result;
use crate::sync::ValidationLimits;
use serde::{Deserialize, Serialize};

/// Settings for one [`crate::Bridge`]. Every field has a default, so a host
/// only spells out what it cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Stable identity of the local replica; a random id when absent.
    pub actor_id: Option<ActorId>,
    /// Text inserted as the first local change. Leave empty when history
    /// will be replayed from the host.
    pub initial_value: String,
    pub content_key: String,
    pub schema: Schema,
    pub limits: ValidationLimits,
}

impl BridgeConfig {
    pub fn for_actor(actor: impl Into<ActorId>) -> Self {
        Self {
            actor_id: Some(actor.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            actor_id: None,
            initial_value: String::new(),
            content_key: DEFAULT_CONTENT_KEY.to_string(),
            schema: Schema::default(),
            limits: ValidationLimits::default(),
        }
    }
}
