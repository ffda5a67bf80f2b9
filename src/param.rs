//! Block parameters: values, declarations, and validated assignment.
//!
//! Blocks declare their user-editable parameters once, in
//! [`Block::setup_parameters`](crate::Block::setup_parameters). Afterwards
//! values only change through [`ParamSet::set`], which validates kind,
//! numeric bounds, and choice lists, so `process` can rely on every value it
//! reads being well-formed.

use std::fmt;

use indexmap::IndexMap;

use crate::error::ParameterError;

/// The kind of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamKind {
    /// A boolean flag.
    Bool,
    /// A signed integer.
    Int,
    /// A floating point number.
    Float,
    /// A string, optionally restricted to a choice list.
    Str,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Bool => write!(f, "bool"),
            ParamKind::Int => write!(f, "int"),
            ParamKind::Float => write!(f, "float"),
            ParamKind::Str => write!(f, "str"),
        }
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
}

impl ParamValue {
    /// The kind of this value.
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// A declared parameter: its current value plus the constraints every
/// assignment is checked against.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    value: ParamValue,
    min: Option<f64>,
    max: Option<f64>,
    choices: Option<Vec<String>>,
}

impl Param {
    /// Declare a parameter with a default value and no constraints beyond
    /// its kind.
    pub fn new(default: impl Into<ParamValue>) -> Self {
        Self {
            value: default.into(),
            min: None,
            max: None,
            choices: None,
        }
    }

    /// Restrict a numeric parameter to the inclusive range `[min, max]`.
    pub fn bounded(self, min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..self
        }
    }

    /// Restrict a string parameter to the given choices.
    pub fn choices(self, choices: &[&str]) -> Self {
        Self {
            choices: Some(choices.iter().map(|c| c.to_string()).collect()),
            ..self
        }
    }

    /// The current value.
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// The declared kind.
    pub fn kind(&self) -> ParamKind {
        self.value.kind()
    }

    fn validate(&self, name: &str, value: &ParamValue) -> Result<(), ParameterError> {
        if value.kind() != self.kind() {
            return Err(ParameterError::WrongType {
                name: name.to_string(),
                expected: self.kind(),
                got: value.kind(),
            });
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            // validated above: kinds match, so numeric bounds imply a
            // numeric value
            if let Some(v) = value.as_f64() {
                if v < min || v > max {
                    return Err(ParameterError::OutOfBounds {
                        name: name.to_string(),
                        value: v,
                        min,
                        max,
                    });
                }
            }
        }
        if let (Some(choices), ParamValue::Str(v)) = (&self.choices, value) {
            if !choices.iter().any(|c| c == v) {
                return Err(ParameterError::InvalidChoice {
                    name: name.to_string(),
                    value: v.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The ordered set of parameters a block declared.
///
/// Iteration order is declaration order, so a GUI can render parameters the
/// way the block author listed them.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamSet {
    params: IndexMap<String, Param>,
}

impl ParamSet {
    /// Declare a parameter. Re-declaring a name replaces the earlier entry.
    pub fn declare(&mut self, name: &str, param: Param) -> &mut Self {
        self.params.insert(name.to_string(), param);
        self
    }

    /// Look up a declared parameter.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    /// Assign a new value after validating it against the declaration.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<(), ParameterError> {
        let value = value.into();
        let param = self.params.get_mut(name).ok_or_else(|| ParameterError::Unknown {
            name: name.to_string(),
        })?;
        param.validate(name, &value)?;
        param.value = value;
        Ok(())
    }

    /// Read a boolean parameter.
    pub fn bool(&self, name: &str) -> Result<bool, ParameterError> {
        match self.require(name)?.value() {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(self.wrong_type(name, ParamKind::Bool, other)),
        }
    }

    /// Read an integer parameter.
    pub fn int(&self, name: &str) -> Result<i64, ParameterError> {
        match self.require(name)?.value() {
            ParamValue::Int(v) => Ok(*v),
            other => Err(self.wrong_type(name, ParamKind::Int, other)),
        }
    }

    /// Read a float parameter.
    pub fn float(&self, name: &str) -> Result<f64, ParameterError> {
        match self.require(name)?.value() {
            ParamValue::Float(v) => Ok(*v),
            other => Err(self.wrong_type(name, ParamKind::Float, other)),
        }
    }

    /// Read a string parameter.
    pub fn str(&self, name: &str) -> Result<&str, ParameterError> {
        match self.require(name)?.value() {
            ParamValue::Str(v) => Ok(v),
            other => Err(self.wrong_type(name, ParamKind::Str, other)),
        }
    }

    /// Iterate over declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> + '_ {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters are declared.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn require(&self, name: &str) -> Result<&Param, ParameterError> {
        self.get(name).ok_or_else(|| ParameterError::Unknown {
            name: name.to_string(),
        })
    }

    fn wrong_type(&self, name: &str, expected: ParamKind, got: &ParamValue) -> ParameterError {
        ParameterError::WrongType {
            name: name.to_string(),
            expected,
            got: got.kind(),
        }
    }
}
