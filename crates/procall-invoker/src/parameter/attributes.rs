//! Attribute scanning

use std::collections::{BTreeMap, HashMap};

use procall_core::SqlType;
use regex::Regex;

use super::descriptor::{Direction, ParameterDescriptor, ParameterSet};
use crate::{InvokeError, Result};

/// Attribute prefix used when none is configured
pub const DEFAULT_PARAMETER_PREFIX: &str = "procedure.args";

/// Recognizes `<prefix>.<direction>.<index>.<field>` attributes
#[derive(Debug, Clone)]
pub struct AttributeParser {
    prefix: String,
    type_key: Regex,
    sibling_key: Regex,
}

impl AttributeParser {
    /// Create a parser for keys under `prefix`
    pub fn new(prefix: &str) -> Result<Self> {
        let prefix = prefix.trim().trim_end_matches('.');
        if prefix.is_empty() {
            return Err(InvokeError::Configuration(
                "parameter prefix must not be blank".into(),
            ));
        }
        let escaped = regex::escape(prefix);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| InvokeError::Configuration(e.to_string()))
        };
        Ok(Self {
            prefix: prefix.to_string(),
            type_key: compile(format!(r"^{escaped}\.(in|out|inout)\.([0-9]+)\.type$"))?,
            sibling_key: compile(format!(r"^{escaped}\.(in|out|inout)\.([0-9]+)\.(value|format|name)$"))?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Merge attribute sources, lowest priority first, into a parameter set
    ///
    /// Every field resolves to its highest-priority occurrence. The direction
    /// of an index comes from the highest-priority source declaring a `type`
    /// for it.
    pub fn parse(&self, sources: &[&HashMap<String, String>]) -> Result<ParameterSet> {
        let mut declared: BTreeMap<u32, Direction> = BTreeMap::new();
        let mut flattened: HashMap<&str, &str> = HashMap::new();

        for source in sources {
            let mut in_source: HashMap<u32, Direction> = HashMap::new();
            for (key, value) in source.iter() {
                flattened.insert(key.as_str(), value.as_str());
                let Some((direction, index)) = self.declaration(key)? else {
                    continue;
                };
                if let Some(previous) = in_source.insert(index, direction) {
                    if previous != direction {
                        return Err(InvokeError::malformed(
                            key.as_str(),
                            format!(
                                "parameter {} is declared as both {} and {}",
                                index, previous, direction
                            ),
                        ));
                    }
                }
            }
            declared.extend(in_source);
        }

        let mut descriptors = BTreeMap::new();
        for (&index, &direction) in &declared {
            let field = |name: &str| {
                flattened
                    .get(format!("{}.{}.{}.{}", self.prefix, direction, index, name).as_str())
                    .map(|v| v.to_string())
            };
            let type_key = format!("{}.{}.{}.type", self.prefix, direction, index);
            let code = field("type")
                .unwrap_or_default()
                .trim()
                .parse::<i32>()
                .map_err(|_| InvokeError::malformed(&type_key, "type code must be an integer"))?;

            let descriptor = ParameterDescriptor {
                direction,
                index,
                sql_type: SqlType::from_code(code),
                value: if direction.is_input() { field("value") } else { None },
                format: field("format"),
                output_name: if direction.is_output() { field("name") } else { None },
            };
            tracing::debug!(
                index,
                direction = %direction,
                sql_type = %descriptor.sql_type,
                has_value = descriptor.value.is_some(),
                "discovered procedure parameter"
            );
            descriptors.insert(index, descriptor);
        }

        for key in flattened.keys() {
            if let Some(captures) = self.sibling_key.captures(key) {
                let matches_declared = captures[2]
                    .parse::<u32>()
                    .ok()
                    .and_then(|index| declared.get(&index))
                    .is_some_and(|d| d.as_str() == &captures[1]);
                if !matches_declared {
                    tracing::debug!(key = %key, "ignoring parameter attribute without type declaration");
                }
            }
        }

        Ok(ParameterSet::from_map(descriptors))
    }

    /// Recognize a `type` declaration key; other keys yield `None`
    fn declaration(&self, key: &str) -> Result<Option<(Direction, u32)>> {
        let under_prefix = key
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('.'));
        if !under_prefix || !key.ends_with(".type") {
            return Ok(None);
        }

        let captures = self.type_key.captures(key).ok_or_else(|| {
            InvokeError::malformed(key, "expected <prefix>.<in|out|inout>.<index>.type")
        })?;
        let direction = Direction::from_token(&captures[1])
            .ok_or_else(|| InvokeError::malformed(key, "unknown parameter direction"))?;
        if captures[2].len() > 1 && captures[2].starts_with('0') {
            return Err(InvokeError::malformed(
                key,
                "parameter index must not have leading zeros",
            ));
        }
        let index = captures[2]
            .parse::<u32>()
            .ok()
            .filter(|i| *i > 0)
            .ok_or_else(|| InvokeError::malformed(key, "parameter index must be a positive integer"))?;

        Ok(Some((direction, index)))
    }
}
