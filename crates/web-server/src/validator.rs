//! Turns raw transport values into a typed `CallRequest`.
//!
//! Validation is all-or-nothing: every declared parameter is checked and every
//! problem is collected before anything is returned, so one response can list
//! all of a caller's mistakes at once.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use core_types::{
    CallParam, CallRequest, Pagination, ParamType, ParamValue, Target, DEFAULT_PAGE_LIMIT,
    MAX_PAGE, MAX_PAGE_LIMIT,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;

/// Values gathered from the query string, the JSON body and the path, keyed by transport name.
pub type RawParams = HashMap<String, JsonValue>;

pub const PAGE_KEY: &str = "page";
pub const LIMIT_KEY: &str = "limit";

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Missing,
    Type,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: Reason,
    pub message: String,
}

impl FieldError {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            reason: Reason::Missing,
            message: format!("{field} is required"),
        }
    }

    pub fn wrong_type(field: &str, expected: ParamType) -> Self {
        Self {
            field: field.to_string(),
            reason: Reason::Type,
            message: format!("{field} must be a valid {expected}"),
        }
    }

    pub fn out_of_range(field: &str, detail: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: Reason::Range,
            message: format!("{field} {}", detail.into()),
        }
    }
}

/// One declared procedure parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Name of the procedure parameter.
    pub name: &'static str,
    /// Name the value arrives under; usually the same as `name`.
    pub key: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn required(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            key: name,
            ty,
            required: true,
            default: None,
        }
    }

    /// An optional parameter; bound as a typed NULL when absent.
    pub fn optional(name: &'static str, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    /// Reads the value from a differently named transport key, e.g. the path `id`.
    pub fn from_key(mut self, key: &'static str) -> Self {
        self.key = key;
        self
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }
}

/// The parameter list of one operation, in binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
    paginated: bool,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Accept `page` and `limit` and pass them on as offset/fetch.
    pub fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_paginated(&self) -> bool {
        self.paginated
    }
}

#[derive(Debug, Clone)]
pub struct RequestValidator {
    schema: ParamSchema,
}

impl RequestValidator {
    pub fn new(schema: ParamSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    /// Builds the call for `operation`, or returns every field error found.
    /// Keys the schema does not declare are ignored.
    pub fn validate(
        &self,
        operation: &str,
        target: Target,
        raw: &RawParams,
    ) -> Result<CallRequest, Vec<FieldError>> {
        let mut request = CallRequest::new(operation, target);
        let mut errors = Vec::new();

        for spec in self.schema.params() {
            match coerce_field(spec, raw.get(spec.key)) {
                Ok(value) => request.params.push(CallParam {
                    name: spec.name.to_string(),
                    value,
                }),
                Err(e) => errors.push(e),
            }
        }

        if self.schema.is_paginated() {
            match pagination(raw) {
                Ok(page) => request.pagination = Some(page),
                Err(mut page_errors) => errors.append(&mut page_errors),
            }
        }

        if errors.is_empty() {
            Ok(request)
        } else {
            Err(errors)
        }
    }
}

fn coerce_field(spec: &ParamSpec, raw: Option<&JsonValue>) -> Result<ParamValue, FieldError> {
    match raw.filter(|value| !is_blank(value, spec.ty)) {
        Some(value) => coerce(spec.key, value, spec.ty),
        None => match (&spec.default, spec.required) {
            (Some(default), _) => Ok(default.clone()),
            (None, true) => Err(FieldError::missing(spec.key)),
            (None, false) => Ok(ParamValue::Null(spec.ty)),
        },
    }
}

/// `null`, and empty strings for anything but a string parameter, count as absent.
fn is_blank(value: &JsonValue, ty: ParamType) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => ty != ParamType::String && s.trim().is_empty(),
        _ => false,
    }
}

/// Coerces one present value to `ty`.
pub fn coerce(field: &str, value: &JsonValue, ty: ParamType) -> Result<ParamValue, FieldError> {
    let wrong_type = || FieldError::wrong_type(field, ty);
    match ty {
        ParamType::Int => {
            let wide = match value {
                JsonValue::Number(n) => n.as_i64().ok_or_else(wrong_type)?,
                JsonValue::String(s) => s.trim().parse::<i64>().map_err(|_| wrong_type())?,
                _ => return Err(wrong_type()),
            };
            i32::try_from(wide)
                .map(ParamValue::Int)
                .map_err(|_| FieldError::out_of_range(field, "does not fit a 32-bit integer"))
        }
        ParamType::Decimal => {
            let text = match value {
                JsonValue::Number(n) => n.to_string(),
                JsonValue::String(s) => s.trim().to_string(),
                _ => return Err(wrong_type()),
            };
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(ParamValue::Decimal)
                .map_err(|_| wrong_type())
        }
        ParamType::Date => match value {
            JsonValue::String(s) => parse_date(s.trim()).map(ParamValue::Date).ok_or_else(wrong_type),
            _ => Err(wrong_type()),
        },
        ParamType::String => match value {
            JsonValue::String(s) => Ok(ParamValue::String(s.clone())),
            JsonValue::Number(n) => Ok(ParamValue::String(n.to_string())),
            JsonValue::Bool(b) => Ok(ParamValue::String(b.to_string())),
            _ => Err(wrong_type()),
        },
        ParamType::Bool => match value {
            JsonValue::Bool(b) => Ok(ParamValue::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(0) => Ok(ParamValue::Bool(false)),
                Some(1) => Ok(ParamValue::Bool(true)),
                _ => Err(wrong_type()),
            },
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "no" => Ok(ParamValue::Bool(false)),
                _ => Err(wrong_type()),
            },
            _ => Err(wrong_type()),
        },
    }
}

/// Accepts `2024-01-01`, `2024-01-01T10:00:00` and full RFC 3339 timestamps.
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

fn pagination(raw: &RawParams) -> Result<Pagination, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut bound = |key: &str, default: u32, max: u32| -> u32 {
        let Some(value) = raw.get(key).filter(|v| !is_blank(v, ParamType::Int)) else {
            return default;
        };
        match coerce(key, value, ParamType::Int) {
            Ok(ParamValue::Int(n)) if n >= 1 && n as u32 <= max => n as u32,
            Ok(_) => {
                errors.push(FieldError::out_of_range(key, format!("must be between 1 and {max}")));
                default
            }
            Err(e) => {
                errors.push(e);
                default
            }
        }
    };

    let page = bound(PAGE_KEY, 1, MAX_PAGE);
    let limit = bound(LIMIT_KEY, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);

    if !errors.is_empty() {
        return Err(errors);
    }
    Pagination::new(page, limit)
        .map_err(|e| vec![FieldError::out_of_range(LIMIT_KEY, e.to_string())])
}
