//! Mapper aggregate
//!
//! A [`Mapper`] owns one element mapper per physical input slot and one force feedback actuator
//! descriptor per physical actuator. It is built once, never mutated, and shared read-only by
//! every virtual controller that uses it.

use serde::Serialize;
use tracing::debug;

use super::element_mapper::{ElementMapper, ExternalInputSink, MappingContext, NullSink};
use super::types::{
    Axis, AxisDirection, Capabilities, ElementIdentifier, PhysicalButton, PhysicalDeviceStatus,
    PhysicalState, PhysicalStick, PhysicalTrigger, VirtualState,
};
use crate::force_feedback::{EffectValue, MagnitudeVector, EFFECT_MAGNITUDE_MAX, EFFECT_MODIFIER_MAX};

/// Smallest number of buttons a virtual controller reports.
pub const MIN_BUTTON_COUNT: usize = 2;

/// Physical input slot that owns one element mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ElementSlot {
    StickLeftX,
    StickLeftY,
    StickRightX,
    StickRightY,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    TriggerLT,
    TriggerRT,
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    ButtonLB,
    ButtonRB,
    ButtonBack,
    ButtonStart,
    ButtonLS,
    ButtonRS,
}

/// Which part of the physical state feeds a slot
enum SlotInput {
    Stick(PhysicalStick),
    Trigger(PhysicalTrigger),
    Button(PhysicalButton),
}

impl ElementSlot {
    pub const COUNT: usize = 20;

    pub const ALL: [ElementSlot; ElementSlot::COUNT] = [
        ElementSlot::StickLeftX,
        ElementSlot::StickLeftY,
        ElementSlot::StickRightX,
        ElementSlot::StickRightY,
        ElementSlot::DpadUp,
        ElementSlot::DpadDown,
        ElementSlot::DpadLeft,
        ElementSlot::DpadRight,
        ElementSlot::TriggerLT,
        ElementSlot::TriggerRT,
        ElementSlot::ButtonA,
        ElementSlot::ButtonB,
        ElementSlot::ButtonX,
        ElementSlot::ButtonY,
        ElementSlot::ButtonLB,
        ElementSlot::ButtonRB,
        ElementSlot::ButtonBack,
        ElementSlot::ButtonStart,
        ElementSlot::ButtonLS,
        ElementSlot::ButtonRS,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            ElementSlot::StickLeftX => "StickLeftX",
            ElementSlot::StickLeftY => "StickLeftY",
            ElementSlot::StickRightX => "StickRightX",
            ElementSlot::StickRightY => "StickRightY",
            ElementSlot::DpadUp => "DpadUp",
            ElementSlot::DpadDown => "DpadDown",
            ElementSlot::DpadLeft => "DpadLeft",
            ElementSlot::DpadRight => "DpadRight",
            ElementSlot::TriggerLT => "TriggerLT",
            ElementSlot::TriggerRT => "TriggerRT",
            ElementSlot::ButtonA => "ButtonA",
            ElementSlot::ButtonB => "ButtonB",
            ElementSlot::ButtonX => "ButtonX",
            ElementSlot::ButtonY => "ButtonY",
            ElementSlot::ButtonLB => "ButtonLB",
            ElementSlot::ButtonRB => "ButtonRB",
            ElementSlot::ButtonBack => "ButtonBack",
            ElementSlot::ButtonStart => "ButtonStart",
            ElementSlot::ButtonLS => "ButtonLS",
            ElementSlot::ButtonRS => "ButtonRS",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|slot| slot.name() == name)
    }

    fn input(self) -> SlotInput {
        match self {
            ElementSlot::StickLeftX => SlotInput::Stick(PhysicalStick::LeftX),
            ElementSlot::StickLeftY => SlotInput::Stick(PhysicalStick::LeftY),
            ElementSlot::StickRightX => SlotInput::Stick(PhysicalStick::RightX),
            ElementSlot::StickRightY => SlotInput::Stick(PhysicalStick::RightY),
            ElementSlot::DpadUp => SlotInput::Button(PhysicalButton::DpadUp),
            ElementSlot::DpadDown => SlotInput::Button(PhysicalButton::DpadDown),
            ElementSlot::DpadLeft => SlotInput::Button(PhysicalButton::DpadLeft),
            ElementSlot::DpadRight => SlotInput::Button(PhysicalButton::DpadRight),
            ElementSlot::TriggerLT => SlotInput::Trigger(PhysicalTrigger::LT),
            ElementSlot::TriggerRT => SlotInput::Trigger(PhysicalTrigger::RT),
            ElementSlot::ButtonA => SlotInput::Button(PhysicalButton::A),
            ElementSlot::ButtonB => SlotInput::Button(PhysicalButton::B),
            ElementSlot::ButtonX => SlotInput::Button(PhysicalButton::X),
            ElementSlot::ButtonY => SlotInput::Button(PhysicalButton::Y),
            ElementSlot::ButtonLB => SlotInput::Button(PhysicalButton::LB),
            ElementSlot::ButtonRB => SlotInput::Button(PhysicalButton::RB),
            ElementSlot::ButtonBack => SlotInput::Button(PhysicalButton::Back),
            ElementSlot::ButtonStart => SlotInput::Button(PhysicalButton::Start),
            ElementSlot::ButtonLS => SlotInput::Button(PhysicalButton::LS),
            ElementSlot::ButtonRS => SlotInput::Button(PhysicalButton::RS),
        }
    }
}

impl std::fmt::Display for ElementSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One root element mapper per slot, `Null` where nothing is mapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMap {
    slots: [ElementMapper; ElementSlot::COUNT],
}

impl Default for ElementMap {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| ElementMapper::Null),
        }
    }
}

impl ElementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style slot assignment.
    pub fn with(mut self, slot: ElementSlot, mapper: ElementMapper) -> Self {
        self.set(slot, mapper);
        self
    }

    pub fn set(&mut self, slot: ElementSlot, mapper: ElementMapper) {
        self.slots[slot.index()] = mapper;
    }

    pub fn get(&self, slot: ElementSlot) -> &ElementMapper {
        &self.slots[slot.index()]
    }

    /// Slots in index order with their mappers.
    pub fn iter(&self) -> impl Iterator<Item = (ElementSlot, &ElementMapper)> {
        ElementSlot::ALL.iter().copied().zip(self.slots.iter())
    }
}

/// Physical force feedback output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PhysicalActuator {
    LeftMotor,
    RightMotor,
    LeftImpulseTrigger,
    RightImpulseTrigger,
}

impl PhysicalActuator {
    pub const COUNT: usize = 4;

    pub const ALL: [PhysicalActuator; PhysicalActuator::COUNT] = [
        PhysicalActuator::LeftMotor,
        PhysicalActuator::RightMotor,
        PhysicalActuator::LeftImpulseTrigger,
        PhysicalActuator::RightImpulseTrigger,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PhysicalActuator::LeftMotor => "LeftMotor",
            PhysicalActuator::RightMotor => "RightMotor",
            PhysicalActuator::LeftImpulseTrigger => "LeftImpulseTrigger",
            PhysicalActuator::RightImpulseTrigger => "RightImpulseTrigger",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|actuator| actuator.name() == name)
    }
}

impl std::fmt::Display for PhysicalActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How one physical actuator derives its output from virtual axis magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceFeedbackActuator {
    #[default]
    Disabled,
    /// Magnitude projection onto X and Y
    Default,
    /// One axis, filtered by direction
    SingleAxis { axis: Axis, direction: AxisDirection },
    /// Length of the two-axis vector
    MagnitudeProjection { first: Axis, second: Axis },
}

impl ForceFeedbackActuator {
    /// Resolve `Default` into the concrete mode it stands for.
    pub fn resolved(self) -> Self {
        match self {
            ForceFeedbackActuator::Default => ForceFeedbackActuator::MagnitudeProjection {
                first: Axis::X,
                second: Axis::Y,
            },
            other => other,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != ForceFeedbackActuator::Disabled
    }

    /// Virtual axes whose magnitude this actuator reads.
    pub fn source_axes(self) -> Vec<Axis> {
        match self.resolved() {
            ForceFeedbackActuator::SingleAxis { axis, .. } => vec![axis],
            ForceFeedbackActuator::MagnitudeProjection { first, second } => vec![first, second],
            _ => Vec::new(),
        }
    }

    /// Unsigned actuator magnitude, before gain, from per-axis magnitudes.
    fn evaluate(self, magnitudes: &MagnitudeVector) -> EffectValue {
        match self.resolved() {
            ForceFeedbackActuator::SingleAxis { axis, direction } => {
                let value = magnitudes[axis.index()];
                match direction {
                    AxisDirection::Both => value.abs(),
                    AxisDirection::Positive => value.max(0.0),
                    AxisDirection::Negative => (-value).max(0.0),
                }
            }
            ForceFeedbackActuator::MagnitudeProjection { first, second } => {
                let a = magnitudes[first.index()];
                let b = magnitudes[second.index()];
                (a * a + b * b).sqrt()
            }
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for ForceFeedbackActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForceFeedbackActuator::Disabled => write!(f, "Disabled"),
            ForceFeedbackActuator::Default => write!(f, "Default"),
            ForceFeedbackActuator::SingleAxis { axis, direction } => match direction {
                AxisDirection::Both => write!(f, "SingleAxis({})", axis),
                _ => write!(f, "SingleAxis({}, {})", axis, direction),
            },
            ForceFeedbackActuator::MagnitudeProjection { first, second } => {
                write!(f, "MagnitudeProjection({}, {})", first, second)
            }
        }
    }
}

/// One actuator descriptor per physical actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceFeedbackActuatorMap {
    actuators: [ForceFeedbackActuator; PhysicalActuator::COUNT],
}

impl Default for ForceFeedbackActuatorMap {
    /// Both motors use the default projection, impulse triggers are off.
    fn default() -> Self {
        Self {
            actuators: [
                ForceFeedbackActuator::Default,
                ForceFeedbackActuator::Default,
                ForceFeedbackActuator::Disabled,
                ForceFeedbackActuator::Disabled,
            ],
        }
    }
}

impl ForceFeedbackActuatorMap {
    /// Every actuator disabled.
    pub fn disabled() -> Self {
        Self {
            actuators: [ForceFeedbackActuator::Disabled; PhysicalActuator::COUNT],
        }
    }

    pub fn with(mut self, actuator: PhysicalActuator, mode: ForceFeedbackActuator) -> Self {
        self.set(actuator, mode);
        self
    }

    pub fn set(&mut self, actuator: PhysicalActuator, mode: ForceFeedbackActuator) {
        self.actuators[actuator.index()] = mode;
    }

    pub fn get(&self, actuator: PhysicalActuator) -> ForceFeedbackActuator {
        self.actuators[actuator.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhysicalActuator, ForceFeedbackActuator)> + '_ {
        PhysicalActuator::ALL.iter().copied().zip(self.actuators.iter().copied())
    }
}

/// Output values for every physical actuator, in hardware motor units (0..=65535)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PhysicalActuatorComponents {
    pub left_motor: u16,
    pub right_motor: u16,
    pub left_impulse_trigger: u16,
    pub right_impulse_trigger: u16,
}

impl PhysicalActuatorComponents {
    pub fn get(&self, actuator: PhysicalActuator) -> u16 {
        match actuator {
            PhysicalActuator::LeftMotor => self.left_motor,
            PhysicalActuator::RightMotor => self.right_motor,
            PhysicalActuator::LeftImpulseTrigger => self.left_impulse_trigger,
            PhysicalActuator::RightImpulseTrigger => self.right_impulse_trigger,
        }
    }

    fn set(&mut self, actuator: PhysicalActuator, value: u16) {
        match actuator {
            PhysicalActuator::LeftMotor => self.left_motor = value,
            PhysicalActuator::RightMotor => self.right_motor = value,
            PhysicalActuator::LeftImpulseTrigger => self.left_impulse_trigger = value,
            PhysicalActuator::RightImpulseTrigger => self.right_impulse_trigger = value,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Effect magnitude to hardware motor units.
fn magnitude_to_motor(magnitude: EffectValue) -> u16 {
    let fraction = (magnitude.abs().min(EFFECT_MAGNITUDE_MAX) / EFFECT_MAGNITUDE_MAX) as f64;
    (fraction * u16::MAX as f64).round() as u16
}

/// Named, immutable translation between physical and virtual controller states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapper {
    name: String,
    elements: ElementMap,
    actuators: ForceFeedbackActuatorMap,
    capabilities: Capabilities,
}

impl Mapper {
    /// Build a mapper and derive its capabilities.
    pub fn new(name: impl Into<String>, elements: ElementMap, actuators: ForceFeedbackActuatorMap) -> Self {
        let name = name.into();
        let capabilities = derive_capabilities(&elements, &actuators);
        debug!(
            "Mapper '{}': {} axes, {} buttons, pov={}, force feedback={}",
            name,
            capabilities.num_axes(),
            capabilities.num_buttons,
            capabilities.has_pov,
            capabilities.supports_force_feedback()
        );

        Self {
            name,
            elements,
            actuators,
            capabilities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn elements(&self) -> &ElementMap {
        &self.elements
    }

    pub fn element(&self, slot: ElementSlot) -> &ElementMapper {
        self.elements.get(slot)
    }

    pub fn actuators(&self) -> &ForceFeedbackActuatorMap {
        &self.actuators
    }

    /// Translate a physical snapshot into a virtual one, discarding keyboard and mouse output.
    pub fn map_state_physical_to_virtual(&self, physical: &PhysicalState, source_id: u32) -> VirtualState {
        self.map_state_physical_to_virtual_with_sink(physical, source_id, &mut NullSink)
    }

    /// Translate a physical snapshot into a virtual one.
    ///
    /// Every slot's mapper contributes in slot order into a neutral state; axes are clamped to
    /// the native range afterwards. Each slot reports to `sink` with source identifier
    /// `(source_id << 8) | slot index`. Physical Y sticks point up, virtual Y axes point down, so
    /// Y stick values are mirrored before mapping.
    pub fn map_state_physical_to_virtual_with_sink(
        &self,
        physical: &PhysicalState,
        source_id: u32,
        sink: &mut dyn ExternalInputSink,
    ) -> VirtualState {
        if physical.status != PhysicalDeviceStatus::Ok {
            return self.map_neutral_physical_to_virtual_with_sink(source_id, sink);
        }

        let mut state = VirtualState::neutral();
        for (slot, mapper) in self.elements.iter() {
            if mapper.is_null() {
                continue;
            }

            let mut ctx = MappingContext {
                state: &mut state,
                sink: &mut *sink,
                source: slot_source(source_id, slot),
            };
            match slot.input() {
                SlotInput::Stick(stick) => {
                    let value = physical.stick(stick);
                    let value = match stick {
                        PhysicalStick::LeftY | PhysicalStick::RightY => mirror_stick(value),
                        _ => value,
                    };
                    mapper.contribute_from_analog_value(&mut ctx, value);
                }
                SlotInput::Trigger(trigger) => {
                    mapper.contribute_from_trigger_value(&mut ctx, physical.trigger(trigger));
                }
                SlotInput::Button(button) => {
                    mapper.contribute_from_button_value(&mut ctx, physical.button(button));
                }
            }
        }

        state.clamp_axes();
        state
    }

    /// Virtual state for a controller that is disconnected or at rest.
    pub fn map_neutral_physical_to_virtual(&self, source_id: u32) -> VirtualState {
        self.map_neutral_physical_to_virtual_with_sink(source_id, &mut NullSink)
    }

    pub fn map_neutral_physical_to_virtual_with_sink(
        &self,
        source_id: u32,
        sink: &mut dyn ExternalInputSink,
    ) -> VirtualState {
        let mut state = VirtualState::neutral();
        for (slot, mapper) in self.elements.iter() {
            let mut ctx = MappingContext {
                state: &mut state,
                sink: &mut *sink,
                source: slot_source(source_id, slot),
            };
            mapper.contribute_neutral(&mut ctx);
        }
        state.clamp_axes();
        state
    }

    /// Translate per-axis force magnitudes into physical actuator output.
    ///
    /// # Arguments
    /// * `magnitudes` - Signed magnitude per virtual axis
    /// * `gain` - Device-wide gain, clamped to 0..=10000
    pub fn map_force_feedback_virtual_to_physical(
        &self,
        magnitudes: &MagnitudeVector,
        gain: u32,
    ) -> PhysicalActuatorComponents {
        let gain_fraction = gain.min(EFFECT_MODIFIER_MAX) as EffectValue / EFFECT_MODIFIER_MAX as EffectValue;
        let mut components = PhysicalActuatorComponents::default();

        for (actuator, mode) in self.actuators.iter() {
            let magnitude = mode.evaluate(magnitudes) * gain_fraction;
            components.set(actuator, magnitude_to_motor(magnitude));
        }
        components
    }
}

fn slot_source(source_id: u32, slot: ElementSlot) -> u32 {
    (source_id << 8) | slot.index() as u32
}

/// Flip a Y stick value so that up is negative, keeping 0 at rest.
fn mirror_stick(value: i16) -> i16 {
    value.saturating_neg()
}

fn derive_capabilities(elements: &ElementMap, actuators: &ForceFeedbackActuatorMap) -> Capabilities {
    let mut capabilities = Capabilities::default();
    capabilities.axes[Axis::X.index()] = true;
    capabilities.axes[Axis::Y.index()] = true;

    let mut highest_button = 0;
    for (_, mapper) in elements.iter() {
        for target in mapper.target_elements() {
            match target {
                ElementIdentifier::Axis(axis) => capabilities.axes[axis.index()] = true,
                ElementIdentifier::Button(button) => {
                    highest_button = highest_button.max(button.number() as usize)
                }
                ElementIdentifier::Pov => capabilities.has_pov = true,
            }
        }
    }
    capabilities.num_buttons = highest_button.max(MIN_BUTTON_COUNT);

    for (_, mode) in actuators.iter() {
        for axis in mode.source_axes() {
            capabilities.axes[axis.index()] = true;
            capabilities.force_feedback_axes[axis.index()] = true;
        }
    }

    capabilities
}
