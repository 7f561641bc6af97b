use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Permitted fields per record type.
///
/// Types that are not declared are open and accept any field. A declared
/// type accepts exactly the listed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeSchema {
    types: BTreeMap<String, BTreeSet<String>>,
}

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) a closed type
    pub fn declare<I, S>(&mut self, type_name: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types
            .insert(type_name.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_type<I, S>(mut self, type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(type_name, fields);
        self
    }

    pub fn is_closed(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn permits(&self, type_name: &str, field: &str) -> bool {
        self.types
            .get(type_name)
            .map_or(true, |fields| fields.contains(field))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
