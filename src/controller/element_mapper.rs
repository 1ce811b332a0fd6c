//! Element mappers
//!
//! An element mapper takes the value of one physical controller element and contributes it to
//! one or more virtual controller elements. Leaves target a single element; `Invert`, `Split` and
//! `Compound` own their children outright, so a mapper is always a tree.

use super::math::{
    is_analog_pressed, is_analog_pressed_negative, is_analog_pressed_positive, is_trigger_pressed,
};
use super::types::{
    Axis, AxisDirection, Button, ElementIdentifier, MouseAxis, MouseButton, PovDirection,
    VirtualState, ANALOG_VALUE_MAX, ANALOG_VALUE_MIN, ANALOG_VALUE_NEUTRAL, TRIGGER_VALUE_MAX,
    TRIGGER_VALUE_MID,
};

/// Most children a `Compound` mapper may own.
pub const COMPOUND_MAX_CHILDREN: usize = 8;

/// Receiver for contributions that target the simulated keyboard and mouse
///
/// These are outside the virtual controller state. Each call carries the source identifier of
/// the physical element that produced it, so a receiver can combine contributions from several
/// elements targeting the same key or button.
pub trait ExternalInputSink {
    fn keyboard(&mut self, source: u32, scan_code: u8, pressed: bool);
    fn mouse_button(&mut self, source: u32, button: MouseButton, pressed: bool);
    fn mouse_axis(&mut self, source: u32, axis: MouseAxis, value: i32);
}

/// Sink that discards keyboard and mouse contributions
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ExternalInputSink for NullSink {
    fn keyboard(&mut self, _source: u32, _scan_code: u8, _pressed: bool) {}
    fn mouse_button(&mut self, _source: u32, _button: MouseButton, _pressed: bool) {}
    fn mouse_axis(&mut self, _source: u32, _axis: MouseAxis, _value: i32) {}
}

/// Everything a mapper writes into while it runs
pub struct MappingContext<'a> {
    pub state: &'a mut VirtualState,
    pub sink: &'a mut dyn ExternalInputSink,
    pub source: u32,
}

/// Node of an element mapper tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementMapper {
    /// Analog contribution to a virtual axis
    Axis { axis: Axis, direction: AxisDirection },
    /// Thresholded, all-or-nothing contribution to a virtual axis
    DigitalAxis { axis: Axis, direction: AxisDirection },
    /// Press of a virtual button
    Button(Button),
    /// Press of one POV component
    Pov(PovDirection),
    /// Press of a simulated keyboard key, by scan code
    Keyboard(u8),
    /// Motion of a simulated mouse axis
    MouseAxis { axis: MouseAxis, direction: AxisDirection },
    /// Press of a simulated mouse button
    MouseButton(MouseButton),
    /// Child fed the mirrored input
    Invert(Box<ElementMapper>),
    /// Positive half of the input goes to one child, negative half to the other
    Split {
        positive: Box<ElementMapper>,
        negative: Box<ElementMapper>,
    },
    /// Every child fed the same input
    Compound(Vec<ElementMapper>),
    /// Input is consumed and ignored
    Null,
}

impl ElementMapper {
    /// Build a compound mapper, rejecting an empty or oversized child list.
    pub fn compound(children: Vec<ElementMapper>) -> Option<Self> {
        if children.is_empty() || children.len() > COMPOUND_MAX_CHILDREN {
            None
        } else {
            Some(ElementMapper::Compound(children))
        }
    }

    pub fn invert(child: ElementMapper) -> Self {
        ElementMapper::Invert(Box::new(child))
    }

    pub fn split(positive: ElementMapper, negative: ElementMapper) -> Self {
        ElementMapper::Split {
            positive: Box::new(positive),
            negative: Box::new(negative),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ElementMapper::Null)
    }

    /// Contribute a physical stick reading.
    pub fn contribute_from_analog_value(&self, ctx: &mut MappingContext<'_>, value: i16) {
        match self {
            ElementMapper::Axis { axis, direction } => {
                ctx.state[*axis] += analog_axis_value(value, *direction);
            }
            ElementMapper::DigitalAxis { axis, direction } => {
                let pressed_positive = match direction {
                    AxisDirection::Both => is_analog_pressed_positive(value),
                    _ => is_analog_pressed(value),
                };
                let contribution = if pressed_positive {
                    button_axis_value(true, *direction)
                } else if *direction == AxisDirection::Both && is_analog_pressed_negative(value) {
                    ANALOG_VALUE_MIN
                } else {
                    ANALOG_VALUE_NEUTRAL
                };
                ctx.state[*axis] += contribution;
            }
            ElementMapper::MouseAxis { axis, direction } => {
                ctx.sink
                    .mouse_axis(ctx.source, *axis, analog_axis_value(value, *direction));
            }
            ElementMapper::Invert(child) => {
                child.contribute_from_analog_value(ctx, invert_analog_value(value));
            }
            ElementMapper::Split { positive, negative } => {
                if value as i32 >= ANALOG_VALUE_NEUTRAL {
                    positive.contribute_from_analog_value(ctx, value);
                    negative.contribute_neutral(ctx);
                } else {
                    negative.contribute_from_analog_value(ctx, value.saturating_neg());
                    positive.contribute_neutral(ctx);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_from_analog_value(ctx, value);
                }
            }
            ElementMapper::Button(_)
            | ElementMapper::Pov(_)
            | ElementMapper::Keyboard(_)
            | ElementMapper::MouseButton(_) => {
                self.contribute_press(ctx, is_analog_pressed(value));
            }
            ElementMapper::Null => {}
        }
    }

    /// Contribute a physical button reading.
    pub fn contribute_from_button_value(&self, ctx: &mut MappingContext<'_>, pressed: bool) {
        match self {
            ElementMapper::Axis { axis, direction }
            | ElementMapper::DigitalAxis { axis, direction } => {
                ctx.state[*axis] += button_axis_value(pressed, *direction);
            }
            ElementMapper::MouseAxis { axis, direction } => {
                ctx.sink
                    .mouse_axis(ctx.source, *axis, button_axis_value(pressed, *direction));
            }
            ElementMapper::Invert(child) => child.contribute_from_button_value(ctx, !pressed),
            ElementMapper::Split { positive, negative } => {
                if pressed {
                    positive.contribute_from_button_value(ctx, true);
                    negative.contribute_neutral(ctx);
                } else {
                    negative.contribute_from_button_value(ctx, true);
                    positive.contribute_neutral(ctx);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_from_button_value(ctx, pressed);
                }
            }
            ElementMapper::Button(_)
            | ElementMapper::Pov(_)
            | ElementMapper::Keyboard(_)
            | ElementMapper::MouseButton(_) => self.contribute_press(ctx, pressed),
            ElementMapper::Null => {}
        }
    }

    /// Contribute a physical trigger reading.
    pub fn contribute_from_trigger_value(&self, ctx: &mut MappingContext<'_>, value: u8) {
        match self {
            ElementMapper::Axis { axis, direction } => {
                ctx.state[*axis] += trigger_axis_value(value, *direction);
            }
            ElementMapper::DigitalAxis { axis, direction } => {
                ctx.state[*axis] += button_axis_value(is_trigger_pressed(value), *direction);
            }
            ElementMapper::MouseAxis { axis, direction } => {
                ctx.sink
                    .mouse_axis(ctx.source, *axis, trigger_axis_value(value, *direction));
            }
            ElementMapper::Invert(child) => {
                child.contribute_from_trigger_value(ctx, (TRIGGER_VALUE_MAX as u8) - value);
            }
            ElementMapper::Split { positive, negative } => {
                let value = value as i32;
                let half_span = TRIGGER_VALUE_MAX - TRIGGER_VALUE_MID;
                if value >= TRIGGER_VALUE_MID {
                    let stretched = (value - TRIGGER_VALUE_MID) * TRIGGER_VALUE_MAX / half_span;
                    positive.contribute_from_trigger_value(ctx, stretched as u8);
                    negative.contribute_neutral(ctx);
                } else {
                    let stretched = (TRIGGER_VALUE_MID - 1 - value) * TRIGGER_VALUE_MAX / half_span;
                    negative.contribute_from_trigger_value(ctx, stretched as u8);
                    positive.contribute_neutral(ctx);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_from_trigger_value(ctx, value);
                }
            }
            ElementMapper::Button(_)
            | ElementMapper::Pov(_)
            | ElementMapper::Keyboard(_)
            | ElementMapper::MouseButton(_) => {
                self.contribute_press(ctx, is_trigger_pressed(value));
            }
            ElementMapper::Null => {}
        }
    }

    /// Contribute the resting state, used when the physical input is unavailable or idle.
    pub fn contribute_neutral(&self, ctx: &mut MappingContext<'_>) {
        match self {
            ElementMapper::Axis { .. }
            | ElementMapper::DigitalAxis { .. }
            | ElementMapper::Button(_)
            | ElementMapper::Pov(_)
            | ElementMapper::Null => {}
            ElementMapper::Keyboard(_) | ElementMapper::MouseButton(_) => {
                self.contribute_press(ctx, false);
            }
            ElementMapper::MouseAxis { axis, .. } => {
                ctx.sink.mouse_axis(ctx.source, *axis, ANALOG_VALUE_NEUTRAL);
            }
            ElementMapper::Invert(child) => child.contribute_neutral(ctx),
            ElementMapper::Split { positive, negative } => {
                positive.contribute_neutral(ctx);
                negative.contribute_neutral(ctx);
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_neutral(ctx);
                }
            }
        }
    }

    /// Shared press handling for the digital leaves.
    fn contribute_press(&self, ctx: &mut MappingContext<'_>, pressed: bool) {
        match self {
            ElementMapper::Button(button) => ctx.state[*button] |= pressed,
            ElementMapper::Pov(direction) => {
                if pressed {
                    ctx.state.pov.press(*direction);
                }
            }
            ElementMapper::Keyboard(scan_code) => ctx.sink.keyboard(ctx.source, *scan_code, pressed),
            ElementMapper::MouseButton(button) => {
                ctx.sink.mouse_button(ctx.source, *button, pressed)
            }
            _ => {}
        }
    }

    /// Virtual controller elements this tree can write to.
    pub fn target_elements(&self) -> Vec<ElementIdentifier> {
        let mut targets = Vec::new();
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets(&self, targets: &mut Vec<ElementIdentifier>) {
        let target = match self {
            ElementMapper::Axis { axis, .. } | ElementMapper::DigitalAxis { axis, .. } => {
                Some(ElementIdentifier::Axis(*axis))
            }
            ElementMapper::Button(button) => Some(ElementIdentifier::Button(*button)),
            ElementMapper::Pov(_) => Some(ElementIdentifier::Pov),
            ElementMapper::Invert(child) => {
                child.collect_targets(targets);
                None
            }
            ElementMapper::Split { positive, negative } => {
                positive.collect_targets(targets);
                negative.collect_targets(targets);
                None
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.collect_targets(targets);
                }
                None
            }
            ElementMapper::Keyboard(_)
            | ElementMapper::MouseAxis { .. }
            | ElementMapper::MouseButton(_)
            | ElementMapper::Null => None,
        };

        if let Some(target) = target {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
}

/// Canonical mapping-language rendering, parseable back into an equal tree.
impl std::fmt::Display for ElementMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementMapper::Axis { axis, direction } => write_axis_params(f, "Axis", axis, *direction),
            ElementMapper::DigitalAxis { axis, direction } => {
                write_axis_params(f, "DigitalAxis", axis, *direction)
            }
            ElementMapper::Button(button) => write!(f, "Button({})", button.number()),
            ElementMapper::Pov(direction) => write!(f, "Pov({})", direction),
            ElementMapper::Keyboard(scan_code) => write!(f, "Keyboard(0x{:02X})", scan_code),
            ElementMapper::MouseAxis { axis, direction } => {
                write_axis_params(f, "MouseAxis", axis, *direction)
            }
            ElementMapper::MouseButton(button) => write!(f, "MouseButton({})", button),
            ElementMapper::Invert(child) => write!(f, "Invert({})", child),
            ElementMapper::Split { positive, negative } => {
                write!(f, "Split({}, {})", positive, negative)
            }
            ElementMapper::Compound(children) => {
                write!(f, "Compound(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            ElementMapper::Null => write!(f, "Null"),
        }
    }
}

fn write_axis_params(
    f: &mut std::fmt::Formatter<'_>,
    name: &str,
    axis: &dyn std::fmt::Display,
    direction: AxisDirection,
) -> std::fmt::Result {
    match direction {
        AxisDirection::Both => write!(f, "{}({})", name, axis),
        _ => write!(f, "{}({}, {})", name, axis, direction),
    }
}

/// Stick value as an axis contribution, compressed into one half for half-axis directions.
fn analog_axis_value(value: i16, direction: AxisDirection) -> i32 {
    let value = value as i32;
    match direction {
        AxisDirection::Both => value,
        AxisDirection::Positive => (value - ANALOG_VALUE_MIN) >> 1,
        AxisDirection::Negative => (value - ANALOG_VALUE_MAX) >> 1,
    }
}

/// Digital input as an axis contribution.
fn button_axis_value(pressed: bool, direction: AxisDirection) -> i32 {
    match (direction, pressed) {
        (AxisDirection::Both, true) | (AxisDirection::Positive, true) => ANALOG_VALUE_MAX,
        (AxisDirection::Both, false) | (AxisDirection::Negative, true) => ANALOG_VALUE_MIN,
        (_, false) => ANALOG_VALUE_NEUTRAL,
    }
}

/// Trigger value as an axis contribution, spanning the whole axis or one half of it.
fn trigger_axis_value(value: u8, direction: AxisDirection) -> i32 {
    let value = value as i32;
    match direction {
        AxisDirection::Both => {
            ANALOG_VALUE_MIN + value * (ANALOG_VALUE_MAX - ANALOG_VALUE_MIN) / TRIGGER_VALUE_MAX
        }
        AxisDirection::Positive => ANALOG_VALUE_NEUTRAL + value * ANALOG_VALUE_MAX / TRIGGER_VALUE_MAX,
        AxisDirection::Negative => ANALOG_VALUE_NEUTRAL + value * ANALOG_VALUE_MIN / TRIGGER_VALUE_MAX,
    }
}

/// Mirror a stick value across the neutral point (-32768 <-> 32767).
fn invert_analog_value(value: i16) -> i16 {
    ((ANALOG_VALUE_MAX - value as i32) + ANALOG_VALUE_MIN) as i16
}
