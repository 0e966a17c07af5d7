//! Typed node parameters.
//!
//! A `FilterParameter` holds one value of a fixed type. Enum parameters map
//! display names to integer values one-to-one, in insertion order. Every
//! effective change fires the parameter's `changed` signal exactly once;
//! setting a parameter to the value it already holds is silent.

use crate::error::{Result, ScopeFlowError};
use crate::graph::signal::Signal;
use crate::graph::unit::Unit;
use crate::instrument::Capability;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    Bool,
    Int,
    Float,
    Enum,
    String,
    Filename,
}

impl ParameterType {
    fn expected(self) -> &'static str {
        match self {
            ParameterType::Bool => "a boolean",
            ParameterType::Int => "an integer",
            ParameterType::Float => "a number",
            ParameterType::Enum => "one of its enumerated names",
            ParameterType::String | ParameterType::Filename => "a string",
        }
    }
}

/// Loosely typed value used to set a parameter and to persist it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

pub struct FilterParameter {
    /// Set when the parameter is added to a node.
    name: String,
    kind: ParameterType,
    unit: Unit,
    int_value: i64,
    float_value: f64,
    string_value: String,
    enum_table: Vec<(String, i64)>,
    hidden: bool,
    required_capability: Option<Capability>,
    pub changed: Signal<()>,
}

impl FilterParameter {
    pub fn new(kind: ParameterType, unit: Unit) -> Self {
        Self {
            name: String::new(),
            kind,
            unit,
            int_value: 0,
            float_value: 0.0,
            string_value: String::new(),
            enum_table: Vec::new(),
            hidden: false,
            required_capability: None,
            changed: Signal::new(),
        }
    }

    pub fn bool(value: bool) -> Self {
        let mut p = Self::new(ParameterType::Bool, Unit::Counts);
        p.int_value = value as i64;
        p.float_value = p.int_value as f64;
        p
    }

    pub fn int(value: i64, unit: Unit) -> Self {
        let mut p = Self::new(ParameterType::Int, unit);
        p.int_value = value;
        p.float_value = value as f64;
        p
    }

    pub fn float(value: f64, unit: Unit) -> Self {
        let mut p = Self::new(ParameterType::Float, unit);
        p.float_value = value;
        p.int_value = value.round() as i64;
        p
    }

    pub fn string(value: impl Into<String>) -> Self {
        let mut p = Self::new(ParameterType::String, Unit::Counts);
        p.string_value = value.into();
        p
    }

    pub fn filename(value: impl Into<String>) -> Self {
        let mut p = Self::new(ParameterType::Filename, Unit::Counts);
        p.string_value = value.into();
        p
    }

    /// Enum parameter with the given name/value table. The first entry is
    /// the initial value.
    pub fn enumeration<S: Into<String>>(entries: impl IntoIterator<Item = (S, i64)>) -> Self {
        let mut p = Self::new(ParameterType::Enum, Unit::Counts);
        for (name, value) in entries {
            p.add_enum_value(name, value);
        }
        if let Some((_, v)) = p.enum_table.first() {
            p.int_value = *v;
            p.float_value = *v as f64;
        }
        p
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn requires(mut self, capability: Capability) -> Self {
        self.required_capability = Some(capability);
        self
    }

    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn required_capability(&self) -> Option<Capability> {
        self.required_capability
    }

    // Enum table

    /// Add or replace an entry. Any existing entry with the same name or the
    /// same value is removed first so the table stays a bijection.
    pub fn add_enum_value(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        self.enum_table.retain(|(n, v)| *n != name && *v != value);
        self.enum_table.push((name, value));
    }

    pub fn enum_names(&self) -> impl Iterator<Item = &str> {
        self.enum_table.iter().map(|(n, _)| n.as_str())
    }

    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.enum_table
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn enum_name(&self, value: i64) -> Option<&str> {
        self.enum_table
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    // Getters

    pub fn as_bool(&self) -> bool {
        self.int_value != 0
    }

    pub fn as_int(&self) -> i64 {
        self.int_value
    }

    pub fn as_float(&self) -> f64 {
        self.float_value
    }

    pub fn as_str(&self) -> &str {
        &self.string_value
    }

    /// Display form, with unit for numeric parameters.
    pub fn to_display_string(&self) -> String {
        match self.kind {
            ParameterType::Bool => self.as_bool().to_string(),
            ParameterType::Int => self.unit.pretty_print(self.int_value as f64),
            ParameterType::Float => self.unit.pretty_print(self.float_value),
            ParameterType::Enum => self
                .enum_name(self.int_value)
                .map(str::to_string)
                .unwrap_or_else(|| self.int_value.to_string()),
            ParameterType::String | ParameterType::Filename => self.string_value.clone(),
        }
    }

    /// Current value in persisted form. Enums persist by name.
    pub fn value(&self) -> ParameterValue {
        match self.kind {
            ParameterType::Bool => ParameterValue::Bool(self.as_bool()),
            ParameterType::Int => ParameterValue::Int(self.int_value),
            ParameterType::Float => ParameterValue::Float(self.float_value),
            ParameterType::Enum => match self.enum_name(self.int_value) {
                Some(name) => ParameterValue::Text(name.to_string()),
                None => ParameterValue::Int(self.int_value),
            },
            ParameterType::String | ParameterType::Filename => {
                ParameterValue::Text(self.string_value.clone())
            }
        }
    }

    // Setters

    pub fn set_bool(&mut self, value: bool) -> bool {
        self.set_numeric(value as i64, value as i64 as f64)
    }

    pub fn set_int(&mut self, value: i64) -> bool {
        self.set_numeric(value, value as f64)
    }

    pub fn set_float(&mut self, value: f64) -> bool {
        self.set_numeric(value.round() as i64, value)
    }

    pub fn set_string(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.string_value == value {
            return false;
        }
        self.string_value = value;
        self.changed.emit(&());
        true
    }

    /// Select an enum entry by display name.
    pub fn set_enum_name(&mut self, name: &str) -> Result<bool> {
        match self.enum_value(name) {
            Some(v) => Ok(self.set_int(v)),
            None => Err(self.type_error(name)),
        }
    }

    /// Type-checked assignment. Returns whether the value changed.
    pub fn set_value(&mut self, value: &ParameterValue) -> Result<bool> {
        use ParameterType as T;
        use ParameterValue as V;
        match (self.kind, value) {
            (T::Bool, V::Bool(b)) => Ok(self.set_bool(*b)),
            (T::Int, V::Int(i)) => Ok(self.set_int(*i)),
            (T::Int, V::Float(f)) => Ok(self.set_int(f.round() as i64)),
            (T::Float, V::Float(f)) => Ok(self.set_float(*f)),
            (T::Float, V::Int(i)) => Ok(self.set_float(*i as f64)),
            (T::Enum, V::Text(name)) => self.set_enum_name(name),
            (T::Enum, V::Int(i)) if self.enum_name(*i).is_some() => Ok(self.set_int(*i)),
            (T::String | T::Filename, V::Text(s)) => Ok(self.set_string(s.clone())),
            _ => Err(self.type_error(&value.to_string())),
        }
    }

    fn type_error(&self, value: &str) -> ScopeFlowError {
        ScopeFlowError::ParameterType {
            name: self.name.clone(),
            value: value.to_string(),
            expected: self.kind.expected(),
        }
    }

    fn set_numeric(&mut self, int_value: i64, float_value: f64) -> bool {
        if self.int_value == int_value && self.float_value == float_value {
            return false;
        }
        self.int_value = int_value;
        self.float_value = float_value;
        self.changed.emit(&());
        true
    }
}

impl fmt::Debug for FilterParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterParameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &self.value())
            .field("hidden", &self.hidden)
            .finish()
    }
}
