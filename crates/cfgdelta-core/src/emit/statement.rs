use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::{Key, Scalar};
use crate::path::{Path, PathElement};

/// Expression in an emitted statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    /// A bound variable or the root parameter
    Var { name: String },
    /// Field, item or entry of another expression
    Child {
        parent: Box<Expr>,
        element: PathElement,
    },
    Literal { value: Scalar },
    /// Construction of a new record
    Record {
        type_name: String,
        fields: IndexMap<String, Expr>,
    },
    Sequence { items: Vec<Expr> },
    Mapping {
        #[serde(with = "indexmap::map::serde_seq")]
        entries: IndexMap<Key, Expr>,
    },
    Set { members: BTreeSet<Key> },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var { name: name.into() }
    }

    pub fn child(self, element: PathElement) -> Self {
        Expr::Child {
            parent: Box::new(self),
            element,
        }
    }

    /// `base` followed by every element of `path`
    pub fn path(base: Expr, path: &Path) -> Self {
        path.elements()
            .iter()
            .cloned()
            .fold(base, |expr, element| expr.child(element))
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = T>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var { name } => write!(f, "{}", name),
            Expr::Child { parent, element } => write!(f, "{}{}", parent, element),
            Expr::Literal { value } => write!(f, "{}", value),
            Expr::Record { type_name, fields } => {
                write!(f, "{}(", type_name)?;
                write_list(f, fields.iter().map(|(name, value)| format!("{}={}", name, value)))?;
                write!(f, ")")
            }
            Expr::Sequence { items } => {
                write!(f, "[")?;
                write_list(f, items.iter())?;
                write!(f, "]")
            }
            Expr::Mapping { entries } => {
                write!(f, "{{")?;
                write_list(f, entries.iter().map(|(key, value)| format!("{}: {}", key, value)))?;
                write!(f, "}}")
            }
            Expr::Set { members } => {
                write!(f, "set{{")?;
                write_list(f, members.iter())?;
                write!(f, "}}")
            }
        }
    }
}

/// One step of the procedural form of a diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Statement {
    /// Bind `new_shared_values[index]` to a variable
    BindShared { name: String, index: usize, value: Expr },
    /// Keep a handle on an input value before mutations can detach it
    BindAlias { name: String, path: Path, value: Expr },
    /// Set or overwrite a field, item or entry
    Assign { target: Expr, value: Expr },
    /// Remove a field or entry
    Delete { target: Expr },
    /// Change the type of a record
    UpdateType { target: Expr, type_name: String },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::BindShared { name, value, .. } | Statement::BindAlias { name, value, .. } => {
                write!(f, "{} = {}", name, value)
            }
            Statement::Assign { target, value } => write!(f, "{} = {}", target, value),
            Statement::Delete { target } => write!(f, "del {}", target),
            Statement::UpdateType { target, type_name } => {
                write!(f, "update_type({}, {:?})", target, type_name)
            }
        }
    }
}
