//! Element mapper factories
//!
//! One factory per mapper type. Each receives only its own parameter string and owns validation
//! of parameter count, ranges and keywords.

use super::keyboard::scan_code_from_name;
use super::{extract_parameter_list_string_parts, parse_single_element_mapper, parse_unsigned_integer, ParseError};
use crate::controller::element_mapper::{ElementMapper, COMPOUND_MAX_CHILDREN};
use crate::controller::types::{
    Axis, AxisDirection, Button, MouseAxis, MouseButton, PovDirection, KEYBOARD_KEY_COUNT,
    VIRTUAL_BUTTON_COUNT,
};

pub(crate) type MakeElementMapper = fn(&str) -> Result<ElementMapper, ParseError>;

/// Factory for a mapper type name.
pub(crate) fn make_function(type_name: &str) -> Option<MakeElementMapper> {
    let make: MakeElementMapper = match type_name {
        "axis" | "Axis" => make_axis,
        "button" | "Button" => make_button,
        "compound" | "Compound" => make_compound,
        "digitalaxis" | "digitalAxis" | "Digitalaxis" | "DigitalAxis" => make_digital_axis,
        "invert" | "Invert" => make_invert,
        "keyboard" | "Keyboard" | "keystroke" | "Keystroke" | "KeyStroke" => make_keyboard,
        "mouseaxis" | "Mouseaxis" | "MouseAxis" => make_mouse_axis,
        "mousebutton" | "Mousebutton" | "MouseButton" => make_mouse_button,
        "pov" | "Pov" | "POV" | "povhat" | "povHat" | "Povhat" | "PovHat" => make_pov,
        "null" | "Null" | "nothing" | "Nothing" | "none" | "None" | "nil" | "Nil" => make_null,
        "split" | "Split" => make_split,
        _ => return None,
    };
    Some(make)
}

pub(crate) fn axis_from_string(input: &str) -> Option<Axis> {
    match input {
        "x" | "X" => Some(Axis::X),
        "y" | "Y" => Some(Axis::Y),
        "z" | "Z" => Some(Axis::Z),
        "rx" | "Rx" | "rX" | "RX" | "rotx" | "rotX" | "Rotx" | "RotX" => Some(Axis::RotX),
        "ry" | "Ry" | "rY" | "RY" | "roty" | "rotY" | "Roty" | "RotY" => Some(Axis::RotY),
        "rz" | "Rz" | "rZ" | "RZ" | "rotz" | "rotZ" | "Rotz" | "RotZ" => Some(Axis::RotZ),
        _ => None,
    }
}

fn mouse_axis_from_string(input: &str) -> Option<MouseAxis> {
    match input {
        "x" | "X" | "h" | "H" | "horiz" | "Horiz" | "horizontal" | "Horizontal" => Some(MouseAxis::X),
        "y" | "Y" | "v" | "V" | "vert" | "Vert" | "vertical" | "Vertical" => Some(MouseAxis::Y),
        "wheelh" | "wheelH" | "WheelH" | "wheelx" | "wheelX" | "WheelX" | "wheelHorizontal"
        | "WheelHorizontal" => Some(MouseAxis::WheelHorizontal),
        "wheelv" | "wheelV" | "WheelV" | "wheely" | "wheelY" | "WheelY" | "wheelVertical"
        | "WheelVertical" => Some(MouseAxis::WheelVertical),
        _ => None,
    }
}

fn axis_direction_from_string(input: &str) -> Option<AxisDirection> {
    match input {
        "bidir" | "Bidir" | "BiDir" | "BIDIR" | "bidirectional" | "Bidirectional"
        | "BiDirectional" | "BIDIRECTIONAL" | "both" | "Both" | "BOTH" => Some(AxisDirection::Both),
        "+" | "+ve" | "pos" | "Pos" | "POS" | "positive" | "Positive" | "POSITIVE" => {
            Some(AxisDirection::Positive)
        }
        "-" | "-ve" | "neg" | "Neg" | "NEG" | "negative" | "Negative" | "NEGATIVE" => {
            Some(AxisDirection::Negative)
        }
        _ => None,
    }
}

fn pov_direction_from_string(input: &str) -> Option<PovDirection> {
    match input {
        "u" | "U" | "up" | "Up" | "UP" => Some(PovDirection::Up),
        "d" | "D" | "dn" | "Dn" | "DN" | "down" | "Down" | "DOWN" => Some(PovDirection::Down),
        "l" | "L" | "lt" | "Lt" | "LT" | "left" | "Left" | "LEFT" => Some(PovDirection::Left),
        "r" | "R" | "rt" | "Rt" | "RT" | "right" | "Right" | "RIGHT" => Some(PovDirection::Right),
        _ => None,
    }
}

fn mouse_button_from_string(input: &str) -> Option<MouseButton> {
    match input {
        "left" | "Left" | "leftbutton" | "Leftbutton" | "LeftButton" => Some(MouseButton::Left),
        "mid" | "Mid" | "middle" | "Middle" | "middlebutton" | "Middlebutton" | "MiddleButton"
        | "wheel" | "Wheel" | "wheelbutton" | "WheelButton" => Some(MouseButton::Middle),
        "right" | "Right" | "rightbutton" | "Rightbutton" | "RightButton" => Some(MouseButton::Right),
        "x1" | "X1" | "x1button" | "X1Button" | "back" | "Back" | "backbutton" | "Backbutton"
        | "BackButton" => Some(MouseButton::X1),
        "x2" | "X2" | "x2button" | "X2Button" | "forward" | "Forward" | "forwardbutton"
        | "Forwardbutton" | "ForwardButton" => Some(MouseButton::X2),
        _ => None,
    }
}

/// `axis` plus optional `direction`, defaulting to both halves.
pub(crate) fn parse_axis_params<A>(
    params: &str,
    lookup: fn(&str) -> Option<A>,
) -> Result<(A, AxisDirection), ParseError> {
    let parts = extract_parameter_list_string_parts(params).unwrap_or_default();
    if parts.first.is_empty() {
        return Err(ParseError::Invalid("Missing or unparseable axis".to_string()));
    }
    let axis = lookup(parts.first)
        .ok_or_else(|| ParseError::Invalid(format!("{}: Unrecognized axis", parts.first)))?;

    let parts = extract_parameter_list_string_parts(parts.remaining).unwrap_or_default();
    let mut direction = AxisDirection::Both;
    if !parts.first.is_empty() {
        direction = axis_direction_from_string(parts.first).ok_or_else(|| {
            ParseError::Invalid(format!("{}: Unrecognized axis direction", parts.first))
        })?;
    }

    if !parts.remaining.is_empty() {
        return Err(ParseError::Extraneous(parts.remaining.to_string()));
    }
    Ok((axis, direction))
}

fn make_axis(params: &str) -> Result<ElementMapper, ParseError> {
    let (axis, direction) = parse_axis_params(params, axis_from_string).map_err(|e| e.context("Axis"))?;
    Ok(ElementMapper::Axis { axis, direction })
}

fn make_digital_axis(params: &str) -> Result<ElementMapper, ParseError> {
    let (axis, direction) =
        parse_axis_params(params, axis_from_string).map_err(|e| e.context("DigitalAxis"))?;
    Ok(ElementMapper::DigitalAxis { axis, direction })
}

fn make_mouse_axis(params: &str) -> Result<ElementMapper, ParseError> {
    let (axis, direction) =
        parse_axis_params(params, mouse_axis_from_string).map_err(|e| e.context("MouseAxis"))?;
    Ok(ElementMapper::MouseAxis { axis, direction })
}

fn make_button(params: &str) -> Result<ElementMapper, ParseError> {
    parse_unsigned_integer(params, Some(10))
        .and_then(Button::from_number)
        .map(ElementMapper::Button)
        .ok_or_else(|| {
            ParseError::Invalid(format!(
                "Parameter \"{}\" must be a number between 1 and {}",
                params, VIRTUAL_BUTTON_COUNT
            ))
            .context("Button")
        })
}

fn make_compound(params: &str) -> Result<ElementMapper, ParseError> {
    let mut children = Vec::with_capacity(COMPOUND_MAX_CHILDREN);
    let mut remaining = params;

    for i in 0..COMPOUND_MAX_CHILDREN {
        let (child, rest) = parse_single_element_mapper(remaining)
            .map_err(|e| e.context(format!("Compound: Parameter {}", i + 1)))?;
        children.push(child);
        remaining = rest;
        if remaining.is_empty() {
            break;
        }
    }

    if !remaining.is_empty() {
        return Err(ParseError::Invalid(format!(
            "Number of parameters exceeds limit of {}",
            COMPOUND_MAX_CHILDREN
        ))
        .context("Compound"));
    }

    Ok(ElementMapper::Compound(children))
}

fn make_invert(params: &str) -> Result<ElementMapper, ParseError> {
    let (child, remaining) =
        parse_single_element_mapper(params).map_err(|e| e.context("Invert: Parameter 1"))?;
    if !remaining.is_empty() {
        return Err(ParseError::Extraneous(remaining.to_string()).context("Invert"));
    }
    Ok(ElementMapper::invert(child))
}

fn make_keyboard(params: &str) -> Result<ElementMapper, ParseError> {
    scan_code_from_name(params)
        .map(u32::from)
        .or_else(|| parse_unsigned_integer(params, None))
        .filter(|scan_code| *scan_code < KEYBOARD_KEY_COUNT)
        .map(|scan_code| ElementMapper::Keyboard(scan_code as u8))
        .ok_or_else(|| {
            ParseError::Invalid(format!(
                "\"{}\" must map to a scan code between 0 and {}",
                params,
                KEYBOARD_KEY_COUNT - 1
            ))
            .context("Keyboard")
        })
}

fn make_mouse_button(params: &str) -> Result<ElementMapper, ParseError> {
    mouse_button_from_string(params)
        .map(ElementMapper::MouseButton)
        .ok_or_else(|| {
            ParseError::Invalid(format!("\"{}\" must map to a valid mouse button", params))
                .context("MouseButton")
        })
}

fn make_null(params: &str) -> Result<ElementMapper, ParseError> {
    if !params.is_empty() {
        return Err(ParseError::Extraneous(params.to_string()).context("Null"));
    }
    Ok(ElementMapper::Null)
}

fn make_pov(params: &str) -> Result<ElementMapper, ParseError> {
    pov_direction_from_string(params)
        .map(ElementMapper::Pov)
        .ok_or_else(|| {
            ParseError::Invalid(format!("{}: Unrecognized POV direction", params)).context("Pov")
        })
}

fn make_split(params: &str) -> Result<ElementMapper, ParseError> {
    let (positive, remaining) =
        parse_single_element_mapper(params).map_err(|e| e.context("Split: Parameter 1"))?;
    let (negative, remaining) =
        parse_single_element_mapper(remaining).map_err(|e| e.context("Split: Parameter 2"))?;
    if !remaining.is_empty() {
        return Err(ParseError::Extraneous(remaining.to_string()).context("Split"));
    }
    Ok(ElementMapper::split(positive, negative))
}
