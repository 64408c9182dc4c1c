//! Run configuration for a minimization session.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Search strategy used by [`Minimizer::minimize`](super::Minimizer::minimize).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraverseMethod {
    /// Scan nodes one by one.
    #[default]
    Sequential,
    /// Bisect the node range.
    Binary,
    /// Grow a prefix one node at a time, stopping at the first divergence.
    Accumulate,
}

impl TraverseMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            TraverseMethod::Sequential => "sequential",
            TraverseMethod::Binary => "binary",
            TraverseMethod::Accumulate => "accumulate",
        }
    }
}

impl fmt::Display for TraverseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraverseMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(TraverseMethod::Sequential),
            "binary" => Ok(TraverseMethod::Binary),
            "accumulate" => Ok(TraverseMethod::Accumulate),
            other => Err(format!("unknown traverse method {other:?}")),
        }
    }
}

/// Recognized options of a minimization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Feed backend B its own cached outputs from prior rounds instead of
    /// resetting to backend A's, letting errors accumulate forward.
    pub accumulate_error: bool,
    pub traverse_method: TraverseMethod,
    /// Keep searching after the first culprit and report every one.
    pub find_all: bool,
    /// When running a node range directly, emit every node's value instead
    /// of only the range's natural output.
    pub return_intermediate: bool,
}

impl Settings {
    pub fn with_accumulate_error(mut self, value: bool) -> Self {
        self.accumulate_error = value;
        self
    }

    pub fn with_traverse_method(mut self, method: TraverseMethod) -> Self {
        self.traverse_method = method;
        self
    }

    pub fn with_find_all(mut self, value: bool) -> Self {
        self.find_all = value;
        self
    }

    pub fn with_return_intermediate(mut self, value: bool) -> Self {
        self.return_intermediate = value;
        self
    }

    /// Reads settings from `GRAPHMIN_*` environment variables, falling back
    /// to the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        if let Some(value) = env_var("GRAPHMIN_ACCUMULATE_ERROR") {
            settings.accumulate_error = parse_bool(&value);
        }
        if let Some(value) = env_var("GRAPHMIN_TRAVERSE_METHOD") {
            if let Ok(method) = value.parse() {
                settings.traverse_method = method;
            }
        }
        if let Some(value) = env_var("GRAPHMIN_FIND_ALL") {
            settings.find_all = parse_bool(&value);
        }
        if let Some(value) = env_var("GRAPHMIN_RETURN_INTERMEDIATE") {
            settings.return_intermediate = parse_bool(&value);
        }
        settings
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "minimizer settings:")?;
        writeln!(f, "\taccumulate_error: {}", self.accumulate_error)?;
        writeln!(f, "\ttraverse_method: {}", self.traverse_method)?;
        writeln!(f, "\tfind_all: {}", self.find_all)?;
        write!(f, "\treturn_intermediate: {}", self.return_intermediate)
    }
}

fn env_var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}
