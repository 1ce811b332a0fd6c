//! Configuration management for Xidi
//!
//! Handles loading, validating and hot-reloading the YAML configuration file, and turns it into a
//! [`MapperRegistry`] plus the default properties for new virtual controllers.

pub mod watcher;

use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::controller::mapper::{ElementSlot, Mapper, PhysicalActuator};
use crate::controller::math::{AXIS_DEADZONE_MAX, AXIS_SATURATION_MAX};
use crate::controller::registry::{MapperBlueprint, MapperRegistry, DEFAULT_MAPPER_NAME};
use crate::controller::types::{ANALOG_VALUE_MAX, ANALOG_VALUE_MIN};
use crate::controller::virtual_controller::{PropertyError, VirtualController, FORCE_FEEDBACK_GAIN_MAX};
use crate::parser::{element_mapper_from_string, force_feedback_actuator_from_string};
use crate::physical::PHYSICAL_CONTROLLER_COUNT;

pub use watcher::{ConfigWatcher, LoadedConfig};

/// Prefix that addresses a force feedback actuator instead of an element slot
const FORCE_FEEDBACK_PREFIX: &str = "ForceFeedback.";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AppConfig {
    #[serde(default)]
    pub mapper: MapperSelection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_mappers: Vec<CustomMapperConfig>,
    #[serde(default)]
    pub properties: PropertiesConfig,
}

/// Which mapper each player uses
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct MapperSelection {
    /// Mapper for every player without an override
    #[serde(default = "default_mapper_name")]
    pub default: String,
    /// Per-player overrides, keyed by player number 1..=4
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub players: BTreeMap<u8, String>,
}

impl Default for MapperSelection {
    fn default() -> Self {
        Self {
            default: default_mapper_name(),
            players: BTreeMap::new(),
        }
    }
}

/// Mapper built from a template plus mapping-language overrides
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct CustomMapperConfig {
    pub name: String,
    /// Mapper to start from; an empty layout when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Element slot name (or `ForceFeedback.<Actuator>`) to mapping-language text
    #[serde(default)]
    pub elements: BTreeMap<String, String>,
}

/// Properties applied to every new virtual controller
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PropertiesConfig {
    #[serde(default = "default_deadzone")]
    pub deadzone: u32,
    #[serde(default = "default_saturation")]
    pub saturation: u32,
    #[serde(default = "default_range_min")]
    pub range_min: i32,
    #[serde(default = "default_range_max")]
    pub range_max: i32,
    #[serde(default = "default_gain")]
    pub force_feedback_gain: u32,
    #[serde(default = "default_true")]
    pub transforms_enabled: bool,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            deadzone: default_deadzone(),
            saturation: default_saturation(),
            range_min: default_range_min(),
            range_max: default_range_max(),
            force_feedback_gain: default_gain(),
            transforms_enabled: default_true(),
        }
    }
}

impl PropertiesConfig {
    /// Apply these properties to every axis of `controller`.
    pub fn apply_to(&self, controller: &VirtualController) -> Result<(), PropertyError> {
        controller.set_all_axis_deadzone(self.deadzone)?;
        controller.set_all_axis_saturation(self.saturation)?;
        controller.set_all_axis_range(self.range_min, self.range_max)?;
        controller.set_all_axis_transforms_enabled(self.transforms_enabled);
        controller.set_force_feedback_gain(self.force_feedback_gain)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.deadzone > AXIS_DEADZONE_MAX {
            bail!("deadzone {} is invalid (must be 0-{})", self.deadzone, AXIS_DEADZONE_MAX);
        }
        if self.saturation > AXIS_SATURATION_MAX {
            bail!("saturation {} is invalid (must be 0-{})", self.saturation, AXIS_SATURATION_MAX);
        }
        if self.range_min >= self.range_max {
            bail!(
                "range_min {} must be less than range_max {}",
                self.range_min,
                self.range_max
            );
        }
        if self.force_feedback_gain > FORCE_FEEDBACK_GAIN_MAX {
            bail!(
                "force_feedback_gain {} is invalid (must be 0-{})",
                self.force_feedback_gain,
                FORCE_FEEDBACK_GAIN_MAX
            );
        }
        Ok(())
    }
}

impl CustomMapperConfig {
    /// Parse every override into a registry blueprint.
    pub fn blueprint(&self) -> Result<MapperBlueprint> {
        let mut blueprint = MapperBlueprint {
            name: self.name.clone(),
            template: self.template.clone(),
            ..Default::default()
        };

        for (element, text) in &self.elements {
            if let Some(actuator_name) = element.strip_prefix(FORCE_FEEDBACK_PREFIX) {
                let Some(actuator) = PhysicalActuator::from_name(actuator_name) else {
                    bail!("Unknown force feedback actuator '{}'", element);
                };
                let mode = force_feedback_actuator_from_string(text)
                    .with_context(|| format!("Invalid value for '{}'", element))?;
                blueprint.actuators.push((actuator, mode));
            } else {
                let Some(slot) = ElementSlot::from_name(element) else {
                    bail!("Unknown element '{}'", element);
                };
                let mapper = element_mapper_from_string(text)
                    .with_context(|| format!("Invalid value for '{}'", element))?;
                blueprint.elements.push((slot, mapper));
            }
        }

        Ok(blueprint)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;
        info!("Loaded configuration from {}", path);

        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// JSON schema describing the configuration file.
    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(AppConfig);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        self.properties.validate().context("Invalid properties")?;

        for player in self.mapper.players.keys() {
            if *player == 0 || *player > PHYSICAL_CONTROLLER_COUNT {
                bail!(
                    "Player {} is invalid (must be 1-{})",
                    player,
                    PHYSICAL_CONTROLLER_COUNT
                );
            }
        }

        let mut names = HashSet::new();
        for custom in &self.custom_mappers {
            if custom.name.is_empty() {
                bail!("Custom mapper name cannot be empty");
            }
            if !names.insert(custom.name.as_str()) {
                bail!("Custom mapper '{}' is defined more than once", custom.name);
            }
        }

        // Parses every mapping string and resolves every mapper name
        self.build_registry()?;

        Ok(())
    }

    /// Registry holding the built-in mappers, the custom mappers in file order, and the
    /// configured default.
    pub fn build_registry(&self) -> Result<MapperRegistry> {
        let mut registry = MapperRegistry::new();

        for custom in &self.custom_mappers {
            let blueprint = custom
                .blueprint()
                .with_context(|| format!("Invalid custom mapper '{}'", custom.name))?;
            registry
                .register_blueprint(&blueprint)
                .with_context(|| format!("Invalid custom mapper '{}'", custom.name))?;
        }

        registry
            .set_default(&self.mapper.default)
            .context("Invalid default mapper")?;

        for (player, name) in &self.mapper.players {
            if !registry.contains(name) {
                bail!("Player {} uses unknown mapper '{}'", player, name);
            }
        }

        debug!("Built mapper registry with {} mappers", registry.len());
        Ok(registry)
    }

    /// Mapper for a zero-based physical controller index.
    pub fn mapper_for_player(&self, registry: &MapperRegistry, player: u8) -> Option<Arc<Mapper>> {
        let name = self
            .mapper
            .players
            .get(&player.saturating_add(1))
            .map(String::as_str)
            .unwrap_or("");
        registry.get(name)
    }
}

// Default value functions
fn default_mapper_name() -> String { DEFAULT_MAPPER_NAME.to_string() }
fn default_deadzone() -> u32 { 0 }
fn default_saturation() -> u32 { AXIS_SATURATION_MAX }
fn default_range_min() -> i32 { ANALOG_VALUE_MIN }
fn default_range_max() -> i32 { ANALOG_VALUE_MAX }
fn default_gain() -> u32 { FORCE_FEEDBACK_GAIN_MAX }
fn default_true() -> bool { true }
