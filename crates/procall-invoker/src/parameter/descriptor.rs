//! Parameter descriptor types

use std::collections::BTreeMap;

use procall_core::SqlType;
use serde::{Deserialize, Serialize};

use crate::{InvokeError, Result};

/// Direction of a stored procedure parameter
///
/// # Examples
///
/// ```
/// use procall_invoker::Direction;
///
/// assert!(Direction::In.is_input());
/// assert!(!Direction::In.is_output());
/// assert!(Direction::InOut.is_input() && Direction::InOut.is_output());
/// assert_eq!(Direction::InOut.as_str(), "inout");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Value is passed to the procedure
    In,
    /// Value is written by the procedure
    Out,
    /// Value is passed in and written back
    InOut,
}

impl Direction {
    /// Parse the attribute token (`in`, `out`, `inout`)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            "inout" => Some(Direction::InOut),
            _ => None,
        }
    }

    /// The attribute token of this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "inout",
        }
    }

    /// Check if this parameter accepts input values
    pub fn is_input(&self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Check if this parameter produces output values
    pub fn is_output(&self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored procedure argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub direction: Direction,
    /// 1-based placeholder position
    pub index: u32,
    pub sql_type: SqlType,
    /// Text to bind; `None` binds SQL NULL
    pub value: Option<String>,
    /// Date/time pattern or binary encoding token
    pub format: Option<String>,
    /// Label of the output in the result document
    pub output_name: Option<String>,
}

impl ParameterDescriptor {
    /// Create a descriptor with no value, format or name
    pub fn new(direction: Direction, index: u32, sql_type: SqlType) -> Self {
        Self {
            direction,
            index,
            sql_type,
            value: None,
            format: None,
            output_name: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// The format token, treating a blank token as absent
    pub fn format_token(&self) -> Option<&str> {
        self.format.as_deref().filter(|f| !f.trim().is_empty())
    }

    /// The output label, defaulting to `<direction>-<index>` when blank or absent
    pub fn resolved_output_name(&self) -> String {
        match self.output_name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{}-{}", self.direction, self.index),
        }
    }
}

/// Immutable, index-ordered set of descriptors for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    descriptors: BTreeMap<u32, ParameterDescriptor>,
}

impl ParameterSet {
    /// Build a set, rejecting zero or repeated indexes
    pub fn try_from_descriptors(
        descriptors: impl IntoIterator<Item = ParameterDescriptor>,
    ) -> Result<Self> {
        let mut set = BTreeMap::new();
        for descriptor in descriptors {
            let key = format!("{}.{}", descriptor.direction, descriptor.index);
            if descriptor.index == 0 {
                return Err(InvokeError::malformed(key, "parameter index must be positive"));
            }
            if set.insert(descriptor.index, descriptor).is_some() {
                return Err(InvokeError::malformed(key, "parameter index declared twice"));
            }
        }
        Ok(Self { descriptors: set })
    }

    pub(crate) fn from_map(descriptors: BTreeMap<u32, ParameterDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Descriptors in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.descriptors.values()
    }

    /// Descriptors that register an output slot, in ascending index order
    pub fn outputs(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.iter().filter(|d| d.direction.is_output())
    }

    pub fn get(&self, index: u32) -> Option<&ParameterDescriptor> {
        self.descriptors.get(&index)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
