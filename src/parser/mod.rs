//! Mapping language parser
//!
//! Turns configuration text such as `Split(Button(1), Invert(Axis(RotY, +)))` into element mapper
//! trees, and text such as `SingleAxis(X, -)` into force feedback actuator descriptors.
//!
//! Grammar: `Type` optionally followed by a parenthesized, comma-separated parameter list.
//! Parameters may themselves be mapper expressions. Parenthesis balance and nesting depth are
//! checked on the whole string before any semantic parsing happens. Type names and keywords are
//! case-sensitive, with the common spellings of each registered explicitly.

mod actuators;
mod elements;
pub mod keyboard;


use thiserror::Error;
use tracing::debug;

use crate::controller::element_mapper::ElementMapper;
use crate::controller::mapper::ForceFeedbackActuator;

/// Deepest parenthesis nesting an element mapper string may have.
///
/// Enough for `Split` or `Compound` wrapping `Invert` wrapping a leaf, plus one level of slack.
pub const ELEMENT_MAPPER_MAX_RECURSION_DEPTH: u32 = 4;

const BEGIN_PARAMS: char = '(';
const END_PARAMS: char = ')';
const PARAM_SEPARATOR: char = ',';

/// Mapping language parse failure
///
/// `Display` renders the complete human-readable message, including the chain of enclosing
/// mapper types and parameter positions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Syntax error: Unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("Nesting depth {depth} exceeds limit of {limit}")]
    NestingTooDeep { depth: u32, limit: u32 },
    #[error("Nesting is not allowed for force feedback actuators")]
    ActuatorNesting,
    #[error("\"{0}\" contains a syntax error")]
    Syntax(String),
    #[error("Missing or unparseable element mapper type.")]
    MissingType,
    #[error("{0}: Unrecognized element mapper type")]
    UnknownType(String),
    #[error("{0}: Unrecognized force feedback actuator mode")]
    UnknownActuatorMode(String),
    #[error("\"{0}\" is extraneous")]
    Extraneous(String),
    /// Parameter-level failure, such as an out-of-range number or unknown keyword
    #[error("{0}")]
    Invalid(String),
    #[error("{context}: {inner}")]
    Context {
        context: String,
        inner: Box<ParseError>,
    },
}

impl ParseError {
    /// Prefix this error with the name of the enclosing construct.
    pub fn context(self, context: impl Into<String>) -> Self {
        ParseError::Context {
            context: context.into(),
            inner: Box::new(self),
        }
    }

    /// Innermost error, with every context prefix removed.
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::Context { inner, .. } => inner.root(),
            other => other,
        }
    }
}

/// Parse a complete element mapper expression.
///
/// Returns [`ElementMapper::Null`] for `Null` and its synonyms; callers treat that as "nothing
/// mapped".
pub fn element_mapper_from_string(input: &str) -> Result<ElementMapper, ParseError> {
    let depth = compute_recursion_depth(input).ok_or(ParseError::UnbalancedParentheses)?;
    if depth > ELEMENT_MAPPER_MAX_RECURSION_DEPTH {
        return Err(ParseError::NestingTooDeep {
            depth,
            limit: ELEMENT_MAPPER_MAX_RECURSION_DEPTH,
        });
    }

    let (mapper, remaining) = parse_single_element_mapper(input).inspect_err(|e| {
        debug!("Failed to parse element mapper \"{}\": {}", input, e);
    })?;
    if !remaining.is_empty() {
        return Err(ParseError::Extraneous(remaining.to_string()));
    }

    Ok(mapper)
}

/// Parse a complete force feedback actuator expression.
pub fn force_feedback_actuator_from_string(input: &str) -> Result<ForceFeedbackActuator, ParseError> {
    let depth = compute_recursion_depth(input).ok_or(ParseError::UnbalancedParentheses)?;
    if depth > 1 {
        return Err(ParseError::ActuatorNesting);
    }

    actuators::parse_force_feedback_actuator(input)
}

/// Maximum parenthesis nesting depth, or `None` if the parentheses are unbalanced.
pub fn compute_recursion_depth(input: &str) -> Option<u32> {
    let mut depth: u32 = 0;
    let mut max_depth: u32 = 0;

    for c in input.chars() {
        match c {
            BEGIN_PARAMS => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            END_PARAMS => {
                depth = depth.checked_sub(1)?;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return None;
    }
    Some(max_depth)
}

/// Pieces of a mapper expression at one nesting level
///
/// For `Split(Button(1), Null), Axis(X)`: type `Split`, params `Button(1), Null`, remaining
/// `Axis(X)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct StringParts<'a> {
    pub type_name: &'a str,
    pub params: &'a str,
    pub remaining: &'a str,
}

/// First parameter of a parameter list and everything after its separating comma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ParamStringParts<'a> {
    pub first: &'a str,
    pub remaining: &'a str,
}

fn is_whitespace(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn trim(input: &str) -> &str {
    input.trim_matches(is_whitespace)
}

fn trim_front(input: &str) -> &str {
    input.trim_start_matches(is_whitespace)
}

/// Split one mapper expression into its type, parameter list and the text after it.
///
/// Returns `None` on syntax errors: a stray closing parenthesis, an unterminated or empty
/// parameter list, junk after the parameter list, or a dangling comma.
pub(crate) fn extract_element_mapper_string_parts(input: &str) -> Option<StringParts<'_>> {
    let Some(separator) = input.find(|c: char| c == BEGIN_PARAMS || c == END_PARAMS || c == PARAM_SEPARATOR)
    else {
        return Some(StringParts {
            type_name: trim(input),
            ..Default::default()
        });
    };

    match input[separator..].chars().next() {
        Some(PARAM_SEPARATOR) => {
            let remaining = trim(&input[separator + 1..]);
            if remaining.is_empty() {
                return None;
            }
            Some(StringParts {
                type_name: trim(&input[..separator]),
                params: "",
                remaining,
            })
        }
        Some(BEGIN_PARAMS) => {
            let params_start = separator + 1;
            let params_end = params_start + find_param_list_end_position(&input[params_start..])?;

            let mut remaining = trim_front(&input[params_end + 1..]);
            if !remaining.is_empty() {
                remaining = trim(remaining.strip_prefix(PARAM_SEPARATOR)?);
                if remaining.is_empty() {
                    return None;
                }
            }

            let params = trim(&input[params_start..params_end]);
            if params.is_empty() {
                return None;
            }

            Some(StringParts {
                type_name: trim(&input[..separator]),
                params,
                remaining,
            })
        }
        _ => None,
    }
}

/// Same as [`extract_element_mapper_string_parts`] but nothing may follow the expression.
pub(crate) fn extract_force_feedback_actuator_string_parts(input: &str) -> Option<StringParts<'_>> {
    let parts = extract_element_mapper_string_parts(input)?;
    if !parts.remaining.is_empty() {
        return None;
    }
    Some(parts)
}

/// Split a parameter list at its first top-level comma.
///
/// An empty list yields an empty first parameter. Returns `None` for unbalanced parentheses or a
/// dangling comma.
pub(crate) fn extract_parameter_list_string_parts(input: &str) -> Option<ParamStringParts<'_>> {
    let first_end = find_first_parameter_end_position(input)?;
    let first = trim(&input[..first_end]);
    if first_end == input.len() {
        return Some(ParamStringParts { first, remaining: "" });
    }

    let remaining = trim(&input[first_end + 1..]);
    if remaining.is_empty() {
        return None;
    }
    Some(ParamStringParts { first, remaining })
}

/// Byte position of the first top-level comma, or the string length if there is none.
fn find_first_parameter_end_position(input: &str) -> Option<usize> {
    let mut depth: u32 = 0;

    for (pos, c) in input.char_indices() {
        match c {
            BEGIN_PARAMS => depth += 1,
            END_PARAMS => depth = depth.checked_sub(1)?,
            PARAM_SEPARATOR if depth == 0 => return Some(pos),
            _ => {}
        }
    }

    if depth != 0 {
        return None;
    }
    Some(input.len())
}

/// Byte position of the parenthesis closing a parameter list whose opening parenthesis was just
/// consumed.
fn find_param_list_end_position(input: &str) -> Option<usize> {
    let mut depth: u32 = 1;

    for (pos, c) in input.char_indices() {
        match c {
            BEGIN_PARAMS => depth += 1,
            END_PARAMS => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the first mapper expression in `input`, returning it with the unparsed remainder.
pub(crate) fn parse_single_element_mapper(input: &str) -> Result<(ElementMapper, &str), ParseError> {
    let parts = extract_element_mapper_string_parts(input)
        .ok_or_else(|| ParseError::Syntax(input.to_string()))?;
    if parts.type_name.is_empty() {
        return Err(ParseError::MissingType);
    }

    let make = elements::make_function(parts.type_name)
        .ok_or_else(|| ParseError::UnknownType(parts.type_name.to_string()))?;
    let mapper = make(parts.params)?;
    Ok((mapper, parts.remaining))
}

/// Parse an unsigned integer of at most 8 alphanumeric characters.
///
/// With `radix` of `None` the base is detected from the prefix: `0x` for hexadecimal, a leading
/// `0` for octal, decimal otherwise.
pub(crate) fn parse_unsigned_integer(input: &str, radix: Option<u32>) -> Option<u32> {
    const MAX_CHARS: usize = 8;
    if input.is_empty() || input.len() > MAX_CHARS {
        return None;
    }
    if !input.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let (digits, radix) = match radix {
        Some(radix) => (input, radix),
        None => {
            if let Some(hex) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
                (hex, 16)
            } else if input.len() > 1 && input.starts_with('0') {
                (&input[1..], 8)
            } else {
                (input, 10)
            }
        }
    };

    u32::from_str_radix(digits, radix).ok()
}
