//! Parameter set: the resolved bag of typed scalars a model runs with.
//!
//! Parameters are resolved before the model is built: start from
//! [`ParameterSet::defaults`], [`merge`] values loaded from a JSON or YAML
//! file, then apply `key=value` overrides. Once handed to a [`Model`] the set
//! is immutable.
//!
//! Lookups never default silently. Asking for a name that is not present is
//! a [`ParameterError::Unknown`]; asking for the wrong type is a
//! [`ParameterError::TypeMismatch`]. Overrides are the one lenient path: an
//! override naming an unknown parameter is logged as a warning and skipped.
//!
//! [`merge`]: ParameterSet::merge
//! [`Model`]: crate::model::Model

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default number of ticks.
pub const DEFAULT_NTICKS: i64 = 365;

/// Default random seed.
pub const DEFAULT_SEED: i64 = 20_241_107;

/// Errors that can occur when loading, reading, or overriding parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    /// The parameter is not in the set.
    #[error("unknown parameter `{name}`")]
    Unknown {
        /// The requested name.
        name: String,
    },

    /// The parameter exists but holds a different type.
    #[error("parameter `{name}` is {found}, expected {expected}")]
    TypeMismatch {
        /// The requested name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type actually stored.
        found: &'static str,
    },

    /// An override string is not of the form `key=value` or `key:value`.
    #[error("malformed parameter override `{input}` (expected key=value or key:value)")]
    MalformedOverride {
        /// The offending override.
        input: String,
    },

    /// An override value could not be cast to the parameter's type.
    #[error("invalid value `{value}` for parameter `{name}` (expected {expected})")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// The value as given.
        value: String,
        /// The type required by the existing value.
        expected: &'static str,
    },

    /// Failed to read a parameter file from disk.
    #[error("failed to read parameter file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse parameter JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse parameter YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },
}

/// A typed scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicitly absent (e.g. `seed: null`).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl ParamValue {
    /// Human-readable name of the stored type.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    /// Cast `raw` to the same type as `self`.
    ///
    /// A `Null` current value accepts whatever the literal looks like: an
    /// integer, then a float, then a boolean, and finally text.
    fn cast_like(&self, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match self {
            Self::Bool(_) => parse_bool(raw).map(Self::Bool),
            Self::Int(_) => raw.parse().ok().map(Self::Int),
            Self::Float(_) => raw.parse().ok().map(Self::Float),
            Self::Text(_) => Some(Self::Text(raw.to_owned())),
            Self::Null => Some(infer_value(raw)),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn infer_value(raw: &str) -> ParamValue {
    if raw.eq_ignore_ascii_case("null") || raw.is_empty() {
        return ParamValue::Null;
    }
    if let Ok(v) = raw.parse::<i64>() {
        return ParamValue::Int(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return ParamValue::Float(v);
    }
    if let Some(v) = parse_bool(raw) {
        return ParamValue::Bool(v);
    }
    ParamValue::Text(raw.to_owned())
}

/// The result of applying a single override.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideOutcome {
    /// The parameter was updated.
    Applied {
        /// Parameter name.
        name: String,
        /// The new, typed value.
        value: ParamValue,
    },
    /// The parameter is unknown; nothing changed.
    Skipped {
        /// The unknown name.
        name: String,
        /// The value as given.
        value: String,
    },
}

/// Named, typed parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// The parameters every model needs: `nticks`, `seed`, and `verbose`.
    pub fn defaults() -> Self {
        let mut params = Self::new();
        params.set("nticks", DEFAULT_NTICKS);
        params.set("seed", DEFAULT_SEED);
        params.set("verbose", false);
        params
    }

    /// Parse parameters from a JSON string (a flat mapping of scalars).
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Json`] if the string is not a valid mapping.
    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse parameters from a YAML string (a flat mapping of scalars).
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Yaml`] if the string is not a valid mapping.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ParameterError> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Load parameters from a file. Files ending in `.json` are parsed as
    /// JSON, everything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Io`] if the file cannot be read, or a parse
    /// error.
    pub fn from_file(path: &Path) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    /// Insert or replace a value.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.values.insert(name.to_owned(), value.into());
    }

    /// Copy every value of `other` into `self`, replacing existing entries.
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Whether a parameter with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a value by name.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Unknown`] if the name is not present.
    pub fn get(&self, name: &str) -> Result<&ParamValue, ParameterError> {
        self.values.get(name).ok_or_else(|| ParameterError::Unknown {
            name: name.to_owned(),
        })
    }

    /// Look up an integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Unknown`] or [`ParameterError::TypeMismatch`].
    pub fn int(&self, name: &str) -> Result<i64, ParameterError> {
        match self.get(name)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(mismatch(name, "int", other)),
        }
    }

    /// Look up a non-negative integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Unknown`], or [`ParameterError::TypeMismatch`]
    /// if the value is not an integer or is negative.
    pub fn uint(&self, name: &str) -> Result<u64, ParameterError> {
        let value = self.get(name)?;
        match value {
            ParamValue::Int(v) => {
                u64::try_from(*v).map_err(|_err| mismatch(name, "non-negative int", value))
            }
            other => Err(mismatch(name, "non-negative int", other)),
        }
    }

    /// Look up a floating point parameter. Integers are widened.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Unknown`] or [`ParameterError::TypeMismatch`].
    #[allow(clippy::cast_precision_loss)]
    pub fn float(&self, name: &str) -> Result<f64, ParameterError> {
        match self.get(name)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(name, "float", other)),
        }
    }

    /// Look up a boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Unknown`] or [`ParameterError::TypeMismatch`].
    pub fn bool(&self, name: &str) -> Result<bool, ParameterError> {
        match self.get(name)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(mismatch(name, "bool", other)),
        }
    }

    /// Look up a text parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Unknown`] or [`ParameterError::TypeMismatch`].
    pub fn text(&self, name: &str) -> Result<&str, ParameterError> {
        match self.get(name)? {
            ParamValue::Text(v) => Ok(v),
            other => Err(mismatch(name, "text", other)),
        }
    }

    /// Number of ticks to run.
    ///
    /// # Errors
    ///
    /// Returns an error if `nticks` is missing, not an integer, negative, or
    /// does not fit in `usize`.
    pub fn nticks(&self) -> Result<usize, ParameterError> {
        let raw = self.uint("nticks")?;
        usize::try_from(raw).map_err(|_err| ParameterError::InvalidValue {
            name: "nticks".to_owned(),
            value: raw.to_string(),
            expected: "tick count that fits in memory",
        })
    }

    /// Random seed, if one was given.
    ///
    /// A missing or `null` seed yields `None`; the caller picks a
    /// time-derived seed.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::TypeMismatch`] if the seed is present but
    /// not a non-negative integer.
    pub fn seed(&self) -> Result<Option<u64>, ParameterError> {
        match self.values.get("seed") {
            None | Some(ParamValue::Null) => Ok(None),
            Some(_) => self.uint("seed").map(Some),
        }
    }

    /// Verbosity flag.
    ///
    /// # Errors
    ///
    /// Returns an error if `verbose` is missing or not a boolean.
    pub fn verbose(&self) -> Result<bool, ParameterError> {
        self.bool("verbose")
    }

    /// Apply a single `key=value` (or `key:value`) override.
    ///
    /// The value is cast to the type of the existing parameter. An unknown
    /// key is not an error: it is logged as a warning and reported as
    /// [`OverrideOutcome::Skipped`], leaving the set unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::MalformedOverride`] if the string has no
    /// separator, key, or value, and [`ParameterError::InvalidValue`] if the
    /// value cannot be cast.
    pub fn apply_override(&mut self, input: &str) -> Result<OverrideOutcome, ParameterError> {
        let (name, raw) = split_override(input)?;

        let Some(current) = self.values.get(name) else {
            warn!(parameter = name, value = raw, "Unknown parameter override, skipping");
            return Ok(OverrideOutcome::Skipped {
                name: name.to_owned(),
                value: raw.to_owned(),
            });
        };

        let value = current
            .cast_like(raw)
            .ok_or_else(|| ParameterError::InvalidValue {
                name: name.to_owned(),
                value: raw.to_owned(),
                expected: current.type_name(),
            })?;

        info!(parameter = name, %value, "Using parameter override");
        self.values.insert(name.to_owned(), value.clone());
        Ok(OverrideOutcome::Applied {
            name: name.to_owned(),
            value,
        })
    }

    /// Apply a batch of overrides in order, stopping at the first hard error.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`ParameterSet::apply_override`].
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> Result<Vec<OverrideOutcome>, ParameterError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        overrides
            .into_iter()
            .map(|input| self.apply_override(input))
            .collect()
    }
}

fn mismatch(name: &str, expected: &'static str, found: &ParamValue) -> ParameterError {
    ParameterError::TypeMismatch {
        name: name.to_owned(),
        expected,
        found: found.type_name(),
    }
}

/// Split `key=value` / `key:value` at the first run of separators.
fn split_override(input: &str) -> Result<(&str, &str), ParameterError> {
    let malformed = || ParameterError::MalformedOverride {
        input: input.to_owned(),
    };
    let sep = input.find(['=', ':']).ok_or_else(malformed)?;
    let (key, rest) = input.split_at(sep);
    let value = rest.trim_start_matches(['=', ':']);
    let key = key.trim();
    if key.is_empty() || value.trim().is_empty() {
        return Err(malformed());
    }
    Ok((key, value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn defaults_have_core_keys() {
        let params = ParameterSet::defaults();
        assert_eq!(params.nticks().unwrap(), 365);
        assert_eq!(params.seed().unwrap(), Some(20_241_107));
        assert!(!params.verbose().unwrap());
    }

    #[test]
    fn unknown_lookup_fails_loudly() {
        let params = ParameterSet::defaults();
        let err = params.float("cbr").unwrap_err();
        assert!(matches!(err, ParameterError::Unknown { ref name } if name == "cbr"));
    }

    #[test]
    fn type_mismatch_reported() {
        let params = ParameterSet::defaults();
        let err = params.bool("nticks").unwrap_err();
        assert!(matches!(
            err,
            ParameterError::TypeMismatch {
                expected: "bool",
                found: "int",
                ..
            }
        ));
    }

    #[test]
    fn int_widens_to_float() {
        let mut params = ParameterSet::new();
        params.set("cbr", 35_i64);
        assert_eq!(params.float("cbr").unwrap(), 35.0);
    }

    #[test]
    fn null_or_missing_seed_is_none() {
        let mut params = ParameterSet::defaults();
        params.set("seed", ParamValue::Null);
        assert_eq!(params.seed().unwrap(), None);

        let empty = ParameterSet::new();
        assert_eq!(empty.seed().unwrap(), None);
    }

    #[test]
    fn negative_seed_rejected() {
        let mut params = ParameterSet::defaults();
        params.set("seed", -1_i64);
        assert!(params.seed().is_err());
    }

    #[test]
    fn negative_nticks_rejected() {
        let mut params = ParameterSet::defaults();
        params.set("nticks", -5_i64);
        assert!(params.nticks().is_err());
    }

    #[test]
    fn override_casts_to_existing_type() {
        let mut params = ParameterSet::defaults();
        let outcome = params.apply_override("nticks=730").unwrap();
        assert_eq!(
            outcome,
            OverrideOutcome::Applied {
                name: "nticks".to_owned(),
                value: ParamValue::Int(730)
            }
        );
        assert_eq!(params.nticks().unwrap(), 730);

        params.apply_override("verbose:yes").unwrap();
        assert!(params.verbose().unwrap());
    }

    #[test]
    fn unknown_override_is_skipped_without_changes() {
        let mut params = ParameterSet::defaults();
        let before = params.clone();
        let outcome = params.apply_override("nonexistent=5").unwrap();
        assert!(matches!(outcome, OverrideOutcome::Skipped { ref name, .. } if name == "nonexistent"));
        assert_eq!(params, before);
    }

    #[test]
    fn override_with_bad_value_errors() {
        let mut params = ParameterSet::defaults();
        let err = params.apply_override("nticks=lots").unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { expected: "int", .. }));
        assert_eq!(params.nticks().unwrap(), 365);
    }

    #[test]
    fn malformed_overrides_error() {
        let mut params = ParameterSet::defaults();
        for bad in ["nticks", "=5", "nticks=", "  :  "] {
            assert!(
                matches!(
                    params.apply_override(bad),
                    Err(ParameterError::MalformedOverride { .. })
                ),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn separator_runs_collapse() {
        let mut params = ParameterSet::defaults();
        params.apply_override("nticks:=10").unwrap();
        assert_eq!(params.nticks().unwrap(), 10);
    }

    #[test]
    fn null_seed_override_infers_type() {
        let mut params = ParameterSet::defaults();
        params.set("seed", ParamValue::Null);
        params.apply_override("seed=99").unwrap();
        assert_eq!(params.seed().unwrap(), Some(99));
    }

    #[test]
    fn merge_replaces_existing_values() {
        let mut params = ParameterSet::defaults();
        let file = ParameterSet::from_yaml_str("nticks: 10\ncbr: 40.5\n").unwrap();
        params.merge(file);
        assert_eq!(params.nticks().unwrap(), 10);
        assert_eq!(params.float("cbr").unwrap(), 40.5);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn json_and_yaml_agree() {
        let json = ParameterSet::from_json_str(r#"{"nticks": 3, "seed": null, "verbose": true, "label": "x"}"#)
            .unwrap();
        let yaml = ParameterSet::from_yaml_str("nticks: 3\nseed: null\nverbose: true\nlabel: x\n").unwrap();
        assert_eq!(json, yaml);
        assert_eq!(json.text("label").unwrap(), "x");
    }

    #[test]
    fn empty_yaml_is_empty_set() {
        assert!(ParameterSet::from_yaml_str("").unwrap().is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "nticks: 42").unwrap();
        let params = ParameterSet::from_file(file.path()).unwrap();
        assert_eq!(params.nticks().unwrap(), 42);
    }
}
