// src/factors.rs
//
// Violation factor values and the ordered result mapping.
//
// Wire form of a value is deliberately flat so downstream layers can read it
// without knowing the enum: a JSON bool, a JSON string, or the string
// "undeterminable: <reason>".

use indexmap::IndexMap;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker prefix callers can grep for.
pub const UNDETERMINABLE_MARKER: &str = "undeterminable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactorValue {
    Bool(bool),
    Categorical(String),
    Undeterminable { reason: String },
}

impl FactorValue {
    pub fn undeterminable(reason: impl Into<String>) -> Self {
        FactorValue::Undeterminable {
            reason: reason.into(),
        }
    }

    pub fn categorical(value: impl Into<String>) -> Self {
        FactorValue::Categorical(value.into())
    }

    pub fn is_undeterminable(&self) -> bool {
        matches!(self, FactorValue::Undeterminable { .. })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactorValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn from_wire_str(s: &str) -> Self {
        if s == UNDETERMINABLE_MARKER {
            return FactorValue::undeterminable("");
        }
        match s
            .strip_prefix(UNDETERMINABLE_MARKER)
            .and_then(|rest| rest.strip_prefix(": "))
        {
            Some(reason) => FactorValue::undeterminable(reason),
            None => FactorValue::Categorical(s.to_string()),
        }
    }
}

impl From<bool> for FactorValue {
    fn from(b: bool) -> Self {
        FactorValue::Bool(b)
    }
}

impl fmt::Display for FactorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorValue::Bool(b) => write!(f, "{}", b),
            FactorValue::Categorical(s) => write!(f, "{}", s),
            FactorValue::Undeterminable { reason } => {
                write!(f, "{}: {}", UNDETERMINABLE_MARKER, reason)
            }
        }
    }
}

impl Serialize for FactorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FactorValue::Bool(b) => serializer.serialize_bool(*b),
            FactorValue::Categorical(s) => serializer.serialize_str(s),
            FactorValue::Undeterminable { .. } => serializer.collect_str(self),
        }
    }
}

struct FactorValueVisitor;

impl<'de> Visitor<'de> for FactorValueVisitor {
    type Value = FactorValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean or a string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FactorValue, E> {
        Ok(FactorValue::Bool(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FactorValue, E> {
        Ok(FactorValue::from_wire_str(v))
    }
}

impl<'de> Deserialize<'de> for FactorValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FactorValueVisitor)
    }
}

// ============================================================================
// ANALYSIS RESULT
// ============================================================================

/// Insertion-ordered factor name → value mapping for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    factors: IndexMap<String, FactorValue>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factor. Re-inserting an existing name keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FactorValue>) {
        self.factors.insert(name.into(), value.into());
    }

    /// Overwrite an existing factor in place. Returns false if `name` is absent.
    pub fn set(&mut self, name: &str, value: impl Into<FactorValue>) -> bool {
        match self.factors.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FactorValue> {
        self.factors.get(name)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactorValue)> {
        self.factors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of undeterminable factors, in result order.
    pub fn undeterminable_factors(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| v.is_undeterminable())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn needs_clarification(&self) -> bool {
        self.factors.values().any(FactorValue::is_undeterminable)
    }

    /// Overwrite factors with user-supplied answers. Only names already in the
    /// result are touched; the rest are handed back unapplied.
    pub fn apply_clarifications<I>(&mut self, answers: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, FactorValue)>,
    {
        let mut rejected = Vec::new();
        for (name, value) in answers {
            if !self.set(&name, value) {
                rejected.push(name);
            }
        }
        rejected
    }
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.factors.len()))?;
        for (k, v) in &self.factors {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnalysisResult {
        let mut result = AnalysisResult::new();
        result.insert("signal_violation", true);
        result.insert(
            "prior_entry",
            FactorValue::undeterminable("insufficient trajectory data"),
        );
        result.insert("slow_duty", FactorValue::categorical("no slow-down duty on this road"));
        result.insert("tailgating", false);
        result
    }

    #[test]
    fn test_json_roundtrip_preserves_order_and_values() {
        let result = sample();
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"signal_violation":true,"prior_entry":"undeterminable: insufficient trajectory data","slow_duty":"no slow-down duty on this road","tailgating":false}"#
        );

        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(
            back.keys().collect::<Vec<_>>(),
            vec!["signal_violation", "prior_entry", "slow_duty", "tailgating"]
        );
    }

    #[test]
    fn test_undeterminable_listing() {
        let result = sample();
        assert!(result.needs_clarification());
        assert_eq!(result.undeterminable_factors(), vec!["prior_entry"]);
    }

    #[test]
    fn test_clarification_overwrites_in_place() {
        let mut result = sample();
        let rejected = result.apply_clarifications(vec![
            ("prior_entry".to_string(), FactorValue::Bool(true)),
            ("made_up".to_string(), FactorValue::Bool(false)),
        ]);
        assert_eq!(rejected, vec!["made_up".to_string()]);
        assert_eq!(result.get("prior_entry"), Some(&FactorValue::Bool(true)));
        assert_eq!(result.keys().nth(1), Some("prior_entry"));
        assert_eq!(result.len(), 4);
        assert!(!result.needs_clarification());
    }

    #[test]
    fn test_marker_parsing() {
        let v: FactorValue = serde_json::from_str(r#""undeterminable: no crosswalk""#).unwrap();
        assert_eq!(v, FactorValue::undeterminable("no crosswalk"));
        let v: FactorValue = serde_json::from_str(r#""night""#).unwrap();
        assert_eq!(v, FactorValue::categorical("night"));
        assert!(serde_json::from_str::<FactorValue>("3").is_err());
    }

    #[test]
    fn test_marker_needs_exact_prefix() {
        for text in ["undeterminable-ish weather", "undeterminable:no space", "undeterminables"] {
            let v: FactorValue = serde_json::from_str(&format!("\"{}\"", text)).unwrap();
            assert_eq!(v, FactorValue::categorical(text));
        }
        let v: FactorValue = serde_json::from_str(r#""undeterminable""#).unwrap();
        assert_eq!(v, FactorValue::undeterminable(""));
    }
}
