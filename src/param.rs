//! Typed parameter slots.
//!
//! Every pluggable module describes its tunable settings as a
//! [`ParameterSet`]: a fixed table of named, typed slots. A [`Batch`](crate::schedule::Batch)
//! snapshots the tables of all modules; at batch start the Schedule hands
//! each module its table back through `configure`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EngineError, Result};

/// Value of one parameter slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    FloatVec(Vec<f64>),
}

impl ParamValue {
    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::Text(_) => "text",
            ParamValue::FloatVec(_) => "float vector",
        }
    }

    fn same_type(&self, other: &ParamValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v:?}"),
            ParamValue::FloatVec(v) => write!(f, "{v:?}"),
        }
    }
}

/// Named, typed parameter slots of one module.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterSet {
    slots: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a slot (builder style).
    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.slots.insert(name.into(), value);
        self
    }

    /// Overwrites an existing slot; the value must keep the slot's type.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match self.slots.get_mut(name) {
            Some(slot) if slot.same_type(&value) => {
                *slot = value;
                Ok(())
            }
            Some(slot) => Err(EngineError::Configuration(format!(
                "parameter '{name}' is {}, got {}",
                slot.type_name(),
                value.type_name()
            ))),
            None => Err(EngineError::Configuration(format!("unknown parameter '{name}'"))),
        }
    }

    /// Copies every slot of `other` that exists here, checking types.
    pub fn update(&mut self, other: &ParameterSet) -> Result<()> {
        for (name, value) in &other.slots {
            self.set(name, value.clone())?;
        }
        Ok(())
    }

    /// Raw slot value.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.slots.get(name)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the set declares no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over slots by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Non-negative integer slot.
    pub fn usize(&self, name: &str) -> Result<usize> {
        match self.require(name)? {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Int(v) => Err(EngineError::Configuration(format!(
                "parameter '{name}' must be non-negative, got {v}"
            ))),
            other => Err(mismatch(name, "int", other)),
        }
    }

    /// Real slot; integer slots are widened.
    pub fn f64(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(name, "float", other)),
        }
    }

    /// Boolean slot.
    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(mismatch(name, "bool", other)),
        }
    }

    /// Text slot.
    pub fn text(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            ParamValue::Text(v) => Ok(v),
            other => Err(mismatch(name, "text", other)),
        }
    }

    /// Real vector slot.
    pub fn floats(&self, name: &str) -> Result<&[f64]> {
        match self.require(name)? {
            ParamValue::FloatVec(v) => Ok(v),
            other => Err(mismatch(name, "float vector", other)),
        }
    }

    fn require(&self, name: &str) -> Result<&ParamValue> {
        self.slots
            .get(name)
            .ok_or_else(|| EngineError::Configuration(format!("missing parameter '{name}'")))
    }
}

fn mismatch(name: &str, expected: &str, got: &ParamValue) -> EngineError {
    EngineError::Configuration(format!(
        "parameter '{name}' should be {expected}, is {}",
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterSet {
        ParameterSet::new()
            .with("count", ParamValue::Int(3))
            .with("rate", ParamValue::Float(0.5))
            .with("copy", ParamValue::Bool(true))
    }

    #[test]
    fn test_typed_getters() {
        let p = sample();
        assert_eq!(p.usize("count").unwrap(), 3);
        assert_eq!(p.f64("count").unwrap(), 3.0);
        assert_eq!(p.f64("rate").unwrap(), 0.5);
        assert!(p.bool("copy").unwrap());
        assert!(p.bool("rate").is_err());
        assert!(p.usize("missing").is_err());
    }

    #[test]
    fn test_set_keeps_slot_type() {
        let mut p = sample();
        assert!(p.set("count", ParamValue::Int(7)).is_ok());
        assert_eq!(p.usize("count").unwrap(), 7);
        assert!(p.set("count", ParamValue::Float(1.0)).is_err());
        assert!(p.set("nope", ParamValue::Int(1)).is_err());
    }

    #[test]
    fn test_update_from_other() {
        let mut p = sample();
        let patch = ParameterSet::new().with("rate", ParamValue::Float(0.25));
        p.update(&patch).unwrap();
        assert_eq!(p.f64("rate").unwrap(), 0.25);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_negative_usize_rejected() {
        let p = ParameterSet::new().with("n", ParamValue::Int(-1));
        assert!(p.usize("n").is_err());
    }
}
