use std::collections::BTreeMap;

use crate::effects::spec::{EffectKind, ParamValue};
use crate::foundation::error::{FramelabError, FramelabResult};

/// Typed, validating view over an effect's parameter map.
///
/// Every accessor reports missing, mistyped and out-of-range values as
/// [`FramelabError::Validation`] naming the effect and the parameter.
#[derive(Clone, Copy, Debug)]
pub struct EffectParams<'a> {
    kind: &'a EffectKind,
    map: &'a BTreeMap<String, ParamValue>,
}

impl<'a> EffectParams<'a> {
    /// Bind a parameter map to the kind it belongs to.
    pub fn new(kind: &'a EffectKind, map: &'a BTreeMap<String, ParamValue>) -> Self {
        Self { kind, map }
    }

    /// Raw value, if present.
    pub fn raw(&self, key: &str) -> Option<&'a ParamValue> {
        self.map.get(key)
    }

    fn err(&self, msg: impl std::fmt::Display) -> FramelabError {
        FramelabError::validation(format!("{}: {msg}", self.kind))
    }

    /// Finite number, or `default` when absent.
    pub fn number(&self, key: &str, default: Option<f64>) -> FramelabResult<f64> {
        match self.map.get(key) {
            Some(ParamValue::Number(n)) if n.is_finite() => Ok(*n),
            Some(ParamValue::Number(_)) => Err(self.err(format_args!("param '{key}' must be finite"))),
            Some(ParamValue::Text(_)) => {
                Err(self.err(format_args!("param '{key}' must be a number")))
            }
            None => default.ok_or_else(|| self.err(format_args!("missing param '{key}'"))),
        }
    }

    /// Number inside the inclusive range `[lo, hi]`.
    pub fn number_in(&self, key: &str, default: Option<f64>, lo: f64, hi: f64) -> FramelabResult<f64> {
        let v = self.number(key, default)?;
        if v < lo || v > hi {
            return Err(self.err(format_args!("param '{key}' = {v} is outside [{lo}, {hi}]")));
        }
        Ok(v)
    }

    /// Integral number inside the inclusive range `[lo, hi]`.
    pub fn int_in(&self, key: &str, default: Option<i64>, lo: i64, hi: i64) -> FramelabResult<i64> {
        let v = self.number(key, default.map(|d| d as f64))?;
        if v.fract() != 0.0 {
            return Err(self.err(format_args!("param '{key}' must be an integer")));
        }
        let v = v as i64;
        if v < lo || v > hi {
            return Err(self.err(format_args!("param '{key}' = {v} is outside [{lo}, {hi}]")));
        }
        Ok(v)
    }

    /// Non-negative integral number fitting in `u32`.
    pub fn u32(&self, key: &str, default: Option<u32>) -> FramelabResult<u32> {
        let v = self.int_in(key, default.map(i64::from), 0, i64::from(u32::MAX))?;
        Ok(v as u32)
    }

    /// Non-empty string.
    pub fn text(&self, key: &str) -> FramelabResult<&'a str> {
        match self.map.get(key) {
            Some(ParamValue::Text(s)) if !s.trim().is_empty() => Ok(s),
            Some(ParamValue::Text(_)) => Err(self.err(format_args!("param '{key}' must be non-empty"))),
            Some(ParamValue::Number(_)) => {
                Err(self.err(format_args!("param '{key}' must be a string")))
            }
            None => Err(self.err(format_args!("missing param '{key}'"))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/params.rs"]
mod tests;
