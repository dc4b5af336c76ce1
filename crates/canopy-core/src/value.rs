use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// ConvertError
///
/// Raised when a textual attribute or body value cannot be coerced to the
/// scalar type the schema (or a construct hook) asked for.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("cannot convert '{value}' to {expected}")]
pub struct ConvertError {
    pub value: String,
    pub expected: ScalarType,
}

///
/// ScalarType
///
/// The scalar types an attribute or body value may declare.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[remain::sorted]
pub enum ScalarType {
    Bool,
    Int,
    Real,
    Text,
}

impl ScalarType {
    /// Parse canonical text into a typed [`Value`].
    pub fn parse(self, text: &str) -> Result<Value, ConvertError> {
        let err = || ConvertError {
            value: text.to_string(),
            expected: self,
        };

        let value = match self {
            Self::Bool => Value::Bool(parse_bool(text).ok_or_else(err)?),
            Self::Int => Value::Int(text.parse().map_err(|_| err())?),
            Self::Real => Value::Real(text.parse().map_err(|_| err())?),
            Self::Text => Value::Text(text.to_string()),
        };

        Ok(value)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Real => "real",
            Self::Text => "text",
        };

        write!(f, "{name}")
    }
}

///
/// Value
///
/// Scalar value carried by attributes and bodies. Every backend transports
/// values as text; `Display` renders the canonical form and [`ScalarType`]
/// parses it back. `Real` compares by bit pattern so equality stays
/// reflexive.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// The scalar type of this value.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::Int(_) => ScalarType::Int,
            Self::Real(_) => ScalarType::Real,
            Self::Text(_) => ScalarType::Text,
        }
    }

    /// Render the canonical text form used on the wire.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

///
/// FromScalar
///
/// Typed extraction from wire text, used by the reader side. Implementors
/// name the scalar type reported in conversion errors.
///

pub trait FromScalar: Sized {
    const EXPECTED: ScalarType;

    fn from_text(text: &str) -> Result<Self, ConvertError>;
}

impl FromScalar for String {
    const EXPECTED: ScalarType = ScalarType::Text;

    fn from_text(text: &str) -> Result<Self, ConvertError> {
        Ok(text.to_string())
    }
}

impl FromScalar for bool {
    const EXPECTED: ScalarType = ScalarType::Bool;

    fn from_text(text: &str) -> Result<Self, ConvertError> {
        parse_bool(text).ok_or_else(|| ConvertError {
            value: text.to_string(),
            expected: Self::EXPECTED,
        })
    }
}

impl FromScalar for Value {
    const EXPECTED: ScalarType = ScalarType::Text;

    fn from_text(text: &str) -> Result<Self, ConvertError> {
        Ok(Self::Text(text.to_string()))
    }
}

macro_rules! impl_from_scalar_num {
    ($($ty:ty => $expected:expr),* $(,)?) => {
        $(
            impl FromScalar for $ty {
                const EXPECTED: ScalarType = $expected;

                fn from_text(text: &str) -> Result<Self, ConvertError> {
                    text.parse().map_err(|_| ConvertError {
                        value: text.to_string(),
                        expected: Self::EXPECTED,
                    })
                }
            }
        )*
    };
}

impl_from_scalar_num! {
    i64 => ScalarType::Int,
    u64 => ScalarType::Int,
    usize => ScalarType::Int,
    f64 => ScalarType::Real,
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}
