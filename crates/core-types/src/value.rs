use crate::enums::ParamType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

/// A typed, already-coerced parameter value ready to be bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Decimal(Decimal),
    Date(NaiveDate),
    String(String),
    Bool(bool),
    /// An explicit NULL that still carries its declared type, so it can be bound typed.
    Null(ParamType),
}

impl ParamValue {
    /// The declared type this value binds as.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Decimal(_) => ParamType::Decimal,
            ParamValue::Date(_) => ParamType::Date,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Null(ty) => *ty,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null(_))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Renders the value as JSON. Decimals become strings so no precision is lost.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ParamValue::Int(v) => JsonValue::from(*v),
            ParamValue::Decimal(v) => JsonValue::String(v.to_string()),
            ParamValue::Date(v) => JsonValue::String(v.format("%Y-%m-%d").to_string()),
            ParamValue::String(v) => JsonValue::String(v.clone()),
            ParamValue::Bool(v) => JsonValue::Bool(*v),
            ParamValue::Null(_) => JsonValue::Null,
        }
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        ParamValue::Decimal(value)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        ParamValue::Date(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}
