//! Named mapper registry
//!
//! Built once at startup with the built-in layouts, extended with custom layouts from
//! configuration, then handed to whatever creates virtual controllers.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::element_mapper::ElementMapper;
use super::mapper::{
    ElementMap, ElementSlot, ForceFeedbackActuator, ForceFeedbackActuatorMap, Mapper, PhysicalActuator,
};
use super::types::{Axis, AxisDirection, Button, PovDirection};

/// Mapper used when no name is given.
pub const DEFAULT_MAPPER_NAME: &str = "StandardGamepad";

/// Mapper that produces no virtual input at all.
pub const NULL_MAPPER_NAME: &str = "Null";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("mapper name must not be empty")]
    EmptyName,
    #[error("mapper '{0}' is already registered")]
    Duplicate(String),
    #[error("mapper '{0}' is not registered")]
    Unknown(String),
}

/// Element and actuator overrides applied on top of a template mapper
#[derive(Debug, Clone, Default)]
pub struct MapperBlueprint {
    pub name: String,
    /// Mapper to start from; an empty mapper when absent
    pub template: Option<String>,
    pub elements: Vec<(ElementSlot, ElementMapper)>,
    pub actuators: Vec<(PhysicalActuator, ForceFeedbackActuator)>,
}

/// Mappers by name
#[derive(Debug, Clone)]
pub struct MapperRegistry {
    mappers: BTreeMap<String, Arc<Mapper>>,
    default: Arc<Mapper>,
    null: Arc<Mapper>,
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperRegistry {
    /// Registry holding every built-in mapper.
    pub fn new() -> Self {
        let default = Arc::new(standard_gamepad());
        let null = Arc::new(null_mapper());

        let mut mappers = BTreeMap::new();
        for mapper in [
            Arc::clone(&default),
            Arc::new(digital_gamepad()),
            Arc::new(extended_gamepad()),
            Arc::new(xinput_native()),
            Arc::new(xinput_shared_triggers()),
            Arc::clone(&null),
        ] {
            mappers.insert(mapper.name().to_string(), mapper);
        }
        debug!("Mapper registry initialised with {} built-in mappers", mappers.len());

        Self { mappers, default, null }
    }

    /// Look up a mapper; the empty name means the default mapper.
    pub fn get(&self, name: &str) -> Option<Arc<Mapper>> {
        if name.is_empty() {
            return Some(self.default_mapper());
        }
        self.mappers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }

    pub fn default_mapper(&self) -> Arc<Mapper> {
        Arc::clone(&self.default)
    }

    pub fn null_mapper(&self) -> Arc<Mapper> {
        Arc::clone(&self.null)
    }

    /// Make a registered mapper the default.
    pub fn set_default(&mut self, name: &str) -> Result<(), RegistryError> {
        let mapper = self
            .mappers
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        self.default = Arc::clone(mapper);
        info!("Default mapper set to '{}'", name);
        Ok(())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Add a mapper under its own name. Names are unique.
    pub fn register(&mut self, mapper: Mapper) -> Result<Arc<Mapper>, RegistryError> {
        if mapper.name().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.mappers.contains_key(mapper.name()) {
            return Err(RegistryError::Duplicate(mapper.name().to_string()));
        }

        let mapper = Arc::new(mapper);
        self.mappers.insert(mapper.name().to_string(), Arc::clone(&mapper));
        info!("Registered mapper '{}'", mapper.name());
        Ok(mapper)
    }

    /// Build a mapper from a blueprint without registering it.
    pub fn build(&self, blueprint: &MapperBlueprint) -> Result<Mapper, RegistryError> {
        let (mut elements, mut actuators) = match &blueprint.template {
            Some(template) => {
                let base = self
                    .mappers
                    .get(template)
                    .ok_or_else(|| RegistryError::Unknown(template.clone()))?;
                (base.elements().clone(), *base.actuators())
            }
            None => (ElementMap::new(), ForceFeedbackActuatorMap::default()),
        };

        for (slot, mapper) in &blueprint.elements {
            elements.set(*slot, mapper.clone());
        }
        for (actuator, mode) in &blueprint.actuators {
            actuators.set(*actuator, *mode);
        }

        Ok(Mapper::new(blueprint.name.clone(), elements, actuators))
    }

    /// Build and register a mapper from a blueprint.
    pub fn register_blueprint(&mut self, blueprint: &MapperBlueprint) -> Result<Arc<Mapper>, RegistryError> {
        if blueprint.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.contains(&blueprint.name) {
            return Err(RegistryError::Duplicate(blueprint.name.clone()));
        }
        let mapper = self.build(blueprint)?;
        self.register(mapper)
    }
}

// ---------------------------------------------------------------------------------------------
// Built-in layouts
// ---------------------------------------------------------------------------------------------

const FACE_AND_SHOULDER: [ElementSlot; 6] = [
    ElementSlot::ButtonA,
    ElementSlot::ButtonB,
    ElementSlot::ButtonX,
    ElementSlot::ButtonY,
    ElementSlot::ButtonLB,
    ElementSlot::ButtonRB,
];

const MENU_AND_STICK_CLICK: [ElementSlot; 4] = [
    ElementSlot::ButtonBack,
    ElementSlot::ButtonStart,
    ElementSlot::ButtonLS,
    ElementSlot::ButtonRS,
];

fn axis(axis: Axis) -> ElementMapper {
    ElementMapper::Axis {
        axis,
        direction: AxisDirection::Both,
    }
}

fn half_axis(axis: Axis, direction: AxisDirection) -> ElementMapper {
    ElementMapper::Axis { axis, direction }
}

fn digital_axis(axis: Axis) -> ElementMapper {
    ElementMapper::DigitalAxis {
        axis,
        direction: AxisDirection::Both,
    }
}

/// Assign buttons 1, 2, 3, ... to `slots` in order.
fn numbered_buttons(elements: ElementMap, slots: &[ElementSlot]) -> ElementMap {
    slots
        .iter()
        .enumerate()
        .fold(elements, |elements, (index, slot)| match Button::new(index) {
            Some(button) => elements.with(*slot, ElementMapper::Button(button)),
            None => elements,
        })
}

fn with_dpad_pov(elements: ElementMap) -> ElementMap {
    elements
        .with(ElementSlot::DpadUp, ElementMapper::Pov(PovDirection::Up))
        .with(ElementSlot::DpadDown, ElementMapper::Pov(PovDirection::Down))
        .with(ElementSlot::DpadLeft, ElementMapper::Pov(PovDirection::Left))
        .with(ElementSlot::DpadRight, ElementMapper::Pov(PovDirection::Right))
}

fn ten_buttons() -> Vec<ElementSlot> {
    FACE_AND_SHOULDER.iter().chain(MENU_AND_STICK_CLICK.iter()).copied().collect()
}

fn twelve_buttons_with_triggers() -> Vec<ElementSlot> {
    FACE_AND_SHOULDER
        .iter()
        .chain([ElementSlot::TriggerLT, ElementSlot::TriggerRT].iter())
        .chain(MENU_AND_STICK_CLICK.iter())
        .copied()
        .collect()
}

/// Sticks on X/Y and Z/RotZ, triggers as buttons 7 and 8.
fn standard_gamepad() -> Mapper {
    let elements = ElementMap::new()
        .with(ElementSlot::StickLeftX, axis(Axis::X))
        .with(ElementSlot::StickLeftY, axis(Axis::Y))
        .with(ElementSlot::StickRightX, axis(Axis::Z))
        .with(ElementSlot::StickRightY, axis(Axis::RotZ));
    let elements = numbered_buttons(with_dpad_pov(elements), &twelve_buttons_with_triggers());
    Mapper::new(DEFAULT_MAPPER_NAME, elements, ForceFeedbackActuatorMap::default())
}

/// Standard layout with sticks reporting only extremes.
fn digital_gamepad() -> Mapper {
    let elements = ElementMap::new()
        .with(ElementSlot::StickLeftX, digital_axis(Axis::X))
        .with(ElementSlot::StickLeftY, digital_axis(Axis::Y))
        .with(ElementSlot::StickRightX, digital_axis(Axis::Z))
        .with(ElementSlot::StickRightY, digital_axis(Axis::RotZ));
    let elements = numbered_buttons(with_dpad_pov(elements), &twelve_buttons_with_triggers());
    Mapper::new("DigitalGamepad", elements, ForceFeedbackActuatorMap::default())
}

/// Standard stick layout with the triggers on RotX and RotY.
fn extended_gamepad() -> Mapper {
    let elements = ElementMap::new()
        .with(ElementSlot::StickLeftX, axis(Axis::X))
        .with(ElementSlot::StickLeftY, axis(Axis::Y))
        .with(ElementSlot::StickRightX, axis(Axis::Z))
        .with(ElementSlot::StickRightY, axis(Axis::RotZ))
        .with(ElementSlot::TriggerLT, axis(Axis::RotX))
        .with(ElementSlot::TriggerRT, axis(Axis::RotY));
    let elements = numbered_buttons(with_dpad_pov(elements), &ten_buttons());
    Mapper::new("ExtendedGamepad", elements, ForceFeedbackActuatorMap::default())
}

/// Layout reported by the XInput driver's own DirectInput interface.
fn xinput_native() -> Mapper {
    let elements = ElementMap::new()
        .with(ElementSlot::StickLeftX, axis(Axis::X))
        .with(ElementSlot::StickLeftY, axis(Axis::Y))
        .with(ElementSlot::TriggerLT, axis(Axis::Z))
        .with(ElementSlot::StickRightX, axis(Axis::RotX))
        .with(ElementSlot::StickRightY, axis(Axis::RotY))
        .with(ElementSlot::TriggerRT, axis(Axis::RotZ));
    let elements = numbered_buttons(with_dpad_pov(elements), &ten_buttons());
    Mapper::new("XInputNative", elements, ForceFeedbackActuatorMap::default())
}

/// XInput layout with both triggers sharing Z, in opposite directions.
fn xinput_shared_triggers() -> Mapper {
    let elements = ElementMap::new()
        .with(ElementSlot::StickLeftX, axis(Axis::X))
        .with(ElementSlot::StickLeftY, axis(Axis::Y))
        .with(ElementSlot::StickRightX, axis(Axis::RotX))
        .with(ElementSlot::StickRightY, axis(Axis::RotY))
        .with(ElementSlot::TriggerLT, half_axis(Axis::Z, AxisDirection::Positive))
        .with(ElementSlot::TriggerRT, half_axis(Axis::Z, AxisDirection::Negative));
    let elements = numbered_buttons(with_dpad_pov(elements), &ten_buttons());
    Mapper::new("XInputSharedTriggers", elements, ForceFeedbackActuatorMap::default())
}

fn null_mapper() -> Mapper {
    Mapper::new(NULL_MAPPER_NAME, ElementMap::new(), ForceFeedbackActuatorMap::disabled())
}
