//! Positional function arguments: `$fn[first;second;a|b|c]`.

use std::num::NonZeroU64;

use super::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Text,
    Integer,
    Bool,
    /// Discord id, raw or as a `<#id>` / `<@id>` mention.
    Snowflake,
    /// `|` separated values
    List,
}

impl ArgKind {
    fn expected(self) -> &'static str {
        match self {
            ArgKind::Text => "text",
            ArgKind::Integer => "a whole number",
            ArgKind::Bool => "true or false",
            ArgKind::Snowflake => "a Discord id",
            ArgKind::List => "a `|` separated list",
        }
    }
}

/// Declared argument of a script function. An absent argument takes `default`; without one
/// it is missing, which fails only when `required`.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub default: Option<&'static str>,
    pub required: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            required: false,
        }
    }

    pub const fn with_default(name: &'static str, kind: ArgKind, default: &'static str) -> Self {
        Self {
            name,
            kind,
            default: Some(default),
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Snowflake(NonZeroU64),
    List(Vec<String>),
}

/// Arguments after coercion, addressed by their declared name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(&'static str, Option<ArgValue>)>,
}

impl Args {
    fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ArgValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn snowflake(&self, name: &str) -> Option<NonZeroU64> {
        match self.get(name) {
            Some(ArgValue::Snowflake(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.get(name) {
            Some(ArgValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn require_text(&self, name: &'static str) -> Result<&str, BridgeError> {
        self.text(name).ok_or(BridgeError::MissingArgument(name))
    }

    pub fn require_integer(&self, name: &'static str) -> Result<i64, BridgeError> {
        self.integer(name).ok_or(BridgeError::MissingArgument(name))
    }
}

/// Splits the bracket contents on `;` and coerces each piece. The last argument takes the
/// remainder, so a trailing free-text argument may contain `;`. Empty pieces count as absent.
pub fn parse(specs: &[ArgSpec], inside: Option<&str>) -> Result<Args, BridgeError> {
    let pieces: Vec<&str> = match inside {
        Some(raw) if !specs.is_empty() => raw.splitn(specs.len(), ';').map(str::trim).collect(),
        _ => Vec::new(),
    };

    let values = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let raw = pieces
                .get(index)
                .copied()
                .filter(|piece| !piece.is_empty())
                .or(spec.default);

            match raw {
                Some(raw) => coerce(spec, raw).map(|value| (spec.name, Some(value))),
                None if spec.required => Err(BridgeError::MissingArgument(spec.name)),
                None => Ok((spec.name, None)),
            }
        })
        .collect::<Result<_, _>>()?;

    Ok(Args { values })
}

fn coerce(spec: &ArgSpec, raw: &str) -> Result<ArgValue, BridgeError> {
    let invalid = || BridgeError::invalid(spec.name, raw, spec.kind.expected());

    match spec.kind {
        ArgKind::Text => Ok(ArgValue::Text(raw.to_string())),
        ArgKind::Integer => raw.parse().map(ArgValue::Integer).map_err(|_| invalid()),
        ArgKind::Bool => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(ArgValue::Bool(true)),
            "false" | "no" | "0" => Ok(ArgValue::Bool(false)),
            _ => Err(invalid()),
        },
        ArgKind::Snowflake => raw
            .trim_start_matches('<')
            .trim_start_matches(['#', '@', '!', '&'])
            .trim_end_matches('>')
            .parse()
            .map(ArgValue::Snowflake)
            .map_err(|_| invalid()),
        ArgKind::List => Ok(ArgValue::List(
            raw.split('|')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )),
    }
}
