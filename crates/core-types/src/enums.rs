use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// A 32-bit signed integer (`INT4`).
    Int,
    /// An exact decimal (`NUMERIC`).
    Decimal,
    /// A calendar date without time zone (`DATE`).
    Date,
    /// Free text (`TEXT`).
    String,
    Bool,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Decimal => "decimal",
            ParamType::Date => "date",
            ParamType::String => "string",
            ParamType::Bool => "bool",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
