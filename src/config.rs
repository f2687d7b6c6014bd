//! Node configuration.
//!
//! [`RelationActionConfig`] is the part of a node's JSON configuration the
//! pipeline itself consumes. Concrete nodes wrap it in their own type (usually
//! with `#[serde(flatten)]`) and implement [`NodeConfiguration`] so the same
//! loader and validation apply.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entity::{Direction, EntityKind};
use crate::error::ConfigError;

/// Default cache expiration, in seconds.
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 300;

fn default_cache_expiration() -> u64 {
    DEFAULT_CACHE_EXPIRATION_SECS
}

fn default_direction() -> Direction {
    Direction::From
}

/// Which entity to resolve and how the link is oriented.
///
/// # Examples
///
/// ```
/// use relnode::{Direction, EntityKind, RelationActionConfig};
///
/// let config = RelationActionConfig::from_json_str(r#"{
///     "entityType": "ASSET",
///     "entityNamePattern": "${buildingName}",
///     "direction": "TO"
/// }"#).unwrap();
/// assert_eq!(config.entity_type, EntityKind::Asset);
/// assert_eq!(config.direction, Direction::To);
/// assert_eq!(config.entity_cache_expiration, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationActionConfig {
    /// Kind of the entity to resolve.
    pub entity_type: EntityKind,
    /// Pattern producing the entity name from message metadata.
    pub entity_name_pattern: String,
    /// Optional pattern producing the entity subtype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type_pattern: Option<String>,
    /// Side of the link the resolved entity occupies.
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Seconds a resolved identity stays cached; zero disables expiry.
    #[serde(default = "default_cache_expiration")]
    pub entity_cache_expiration: u64,
}

impl RelationActionConfig {
    /// A config with default direction and expiration.
    #[must_use]
    pub fn new(entity_type: EntityKind, entity_name_pattern: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_name_pattern: entity_name_pattern.into(),
            entity_type_pattern: None,
            direction: default_direction(),
            entity_cache_expiration: DEFAULT_CACHE_EXPIRATION_SECS,
        }
    }

    /// Set the subtype pattern.
    #[must_use]
    pub fn with_type_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.entity_type_pattern = Some(pattern.into());
        self
    }

    /// Set the direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the cache expiration in seconds.
    #[must_use]
    pub const fn with_cache_expiration(mut self, seconds: u64) -> Self {
        self.entity_cache_expiration = seconds;
        self
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_name_pattern.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "entityNamePattern".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        load(value)
    }

    /// Parse and validate from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        load_str(json)
    }

    /// Parse and validate from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_path(path)
    }
}

/// A node configuration that embeds a [`RelationActionConfig`].
pub trait NodeConfiguration: DeserializeOwned {
    /// The embedded relation settings.
    fn relation(&self) -> &RelationActionConfig;

    /// Node-specific validation, run after the relation settings are checked.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl NodeConfiguration for RelationActionConfig {
    fn relation(&self) -> &RelationActionConfig {
        self
    }
}

fn checked<C: NodeConfiguration>(config: C) -> Result<C, ConfigError> {
    config.relation().validate()?;
    NodeConfiguration::validate(&config)?;
    Ok(config)
}

/// Load and validate a node configuration from a JSON value.
pub fn load<C: NodeConfiguration>(value: serde_json::Value) -> Result<C, ConfigError> {
    checked(serde_json::from_value(value)?)
}

/// Load and validate a node configuration from JSON text.
pub fn load_str<C: NodeConfiguration>(json: &str) -> Result<C, ConfigError> {
    checked(serde_json::from_str(json)?)
}

/// Load and validate a node configuration from a JSON file.
pub fn load_path<C: NodeConfiguration>(path: impl AsRef<Path>) -> Result<C, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    load_str(&text)
}
