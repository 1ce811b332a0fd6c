//! Force feedback actuator descriptor factories

use super::elements::{axis_from_string, parse_axis_params};
use super::{extract_force_feedback_actuator_string_parts, extract_parameter_list_string_parts, ParseError};
use crate::controller::mapper::ForceFeedbackActuator;

type MakeActuator = fn(&str) -> Result<ForceFeedbackActuator, ParseError>;

fn make_function(mode: &str) -> Option<MakeActuator> {
    let make: MakeActuator = match mode {
        "disable" | "Disable" | "disabled" | "Disabled" | "empty" | "Empty" | "none" | "None"
        | "nothing" | "Nothing" | "null" | "Null" | "off" | "Off" | "unused" | "Unused" => {
            make_disabled
        }
        "default" | "Default" => make_default,
        "singleaxis" | "SingleAxis" => make_single_axis,
        "magnitudeprojection" | "MagnitudeProjection" => make_magnitude_projection,
        _ => return None,
    };
    Some(make)
}

pub(super) fn parse_force_feedback_actuator(input: &str) -> Result<ForceFeedbackActuator, ParseError> {
    let parts = extract_force_feedback_actuator_string_parts(input)
        .ok_or_else(|| ParseError::Syntax(input.to_string()))?;
    if parts.type_name.is_empty() {
        return Err(ParseError::MissingType);
    }

    let make = make_function(parts.type_name)
        .ok_or_else(|| ParseError::UnknownActuatorMode(parts.type_name.to_string()))?;
    make(parts.params)
}

fn make_default(params: &str) -> Result<ForceFeedbackActuator, ParseError> {
    if !params.is_empty() {
        return Err(ParseError::Extraneous(params.to_string()).context("Default"));
    }
    Ok(ForceFeedbackActuator::Default)
}

fn make_disabled(params: &str) -> Result<ForceFeedbackActuator, ParseError> {
    if !params.is_empty() {
        return Err(ParseError::Extraneous(params.to_string()).context("Disabled"));
    }
    Ok(ForceFeedbackActuator::Disabled)
}

fn make_single_axis(params: &str) -> Result<ForceFeedbackActuator, ParseError> {
    let (axis, direction) =
        parse_axis_params(params, axis_from_string).map_err(|e| e.context("SingleAxis"))?;
    Ok(ForceFeedbackActuator::SingleAxis { axis, direction })
}

fn make_magnitude_projection(params: &str) -> Result<ForceFeedbackActuator, ParseError> {
    let invalid = |message: String| ParseError::Invalid(message).context("MagnitudeProjection");

    let parts = extract_parameter_list_string_parts(params).unwrap_or_default();
    if parts.first.is_empty() {
        return Err(invalid("Missing or unparseable first axis".to_string()));
    }
    let first = axis_from_string(parts.first)
        .ok_or_else(|| invalid(format!("{}: Unrecognized first axis", parts.first)))?;

    let parts = extract_parameter_list_string_parts(parts.remaining).unwrap_or_default();
    if parts.first.is_empty() {
        return Err(invalid("Missing or unparseable second axis".to_string()));
    }
    let second = axis_from_string(parts.first)
        .ok_or_else(|| invalid(format!("{}: Unrecognized second axis", parts.first)))?;

    if first == second {
        return Err(invalid("Axes must be different".to_string()));
    }
    if !parts.remaining.is_empty() {
        return Err(ParseError::Extraneous(parts.remaining.to_string()));
    }

    Ok(ForceFeedbackActuator::MagnitudeProjection { first, second })
}
