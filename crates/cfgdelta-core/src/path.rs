//! Paths into configuration trees
//!
//! Grammar: the root is the empty string; `.name` is an attribute, `[n]` an
//! index, `[k]` a mapping key (`"str"`, `'str'`, `-3`, `true`) and
//! `.__type__` a record's type. A non-negative integer in brackets always
//! parses as an index, so integer mapping keys only round-trip through the
//! structured (serde) form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{DeltaError, Result};
use crate::model::{Key, Node, NodeStore, Scalar, Value};

/// Attribute name that addresses a record's type
pub const TYPE_SELECTOR_NAME: &str = "__type__";

/// True if `name` can be written as `.name` in a path
///
/// ASCII letter or `_`, then ASCII letters, digits and `_`.
pub fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PathElement {
    Attribute(String),
    Index(usize),
    Key(Key),
    TypeSelector,
}

impl PathElement {
    pub fn attr(name: impl Into<String>) -> Self {
        PathElement::Attribute(name.into())
    }

    pub fn key(key: impl Into<Key>) -> Self {
        PathElement::Key(key.into())
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Attribute(name) => write!(f, ".{}", name),
            PathElement::Index(i) => write!(f, "[{}]", i),
            PathElement::Key(key) => write!(f, "[{}]", key),
            PathElement::TypeSelector => write!(f, ".{}", TYPE_SELECTOR_NAME),
        }
    }
}

/// Ordered sequence of path elements; the empty path is the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathElement>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn new(elements: Vec<PathElement>) -> Self {
        Path(elements)
    }

    /// Parse the canonical text form
    ///
    /// # Errors
    ///
    /// Returns `PathSyntax` with the offending byte offset.
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).parse()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    /// Path without its last element; `None` for the root
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn child(&self, element: PathElement) -> Path {
        let mut elements = self.0.clone();
        elements.push(element);
        Path(elements)
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Every prefix from the root up to and including the path itself
    pub fn prefixes(&self) -> impl Iterator<Item = Path> + '_ {
        (0..=self.0.len()).map(move |i| Path(self.0[..i].to_vec()))
    }

    /// Path with `suffix` appended
    pub fn join(&self, suffix: &Path) -> Path {
        let mut elements = self.0.clone();
        elements.extend(suffix.0.iter().cloned());
        Path(elements)
    }

    pub fn attr(self, name: impl Into<String>) -> Self {
        self.with(PathElement::Attribute(name.into()))
    }

    pub fn index(self, index: usize) -> Self {
        self.with(PathElement::Index(index))
    }

    pub fn key(self, key: impl Into<Key>) -> Self {
        self.with(PathElement::Key(key.into()))
    }

    pub fn type_selector(self) -> Self {
        self.with(PathElement::TypeSelector)
    }

    fn with(mut self, element: PathElement) -> Self {
        self.0.push(element);
        self
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = DeltaError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Path(elements)
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> DeltaError {
        DeltaError::PathSyntax {
            input: self.input.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn parse(mut self) -> Result<Path> {
        let mut elements = Vec::new();
        while let Some((offset, c)) = self.chars.next() {
            let element = match c {
                '.' => self.attribute()?,
                '[' => self.bracketed()?,
                other => {
                    return Err(self.error(offset, format!("expected '.' or '[', found {:?}", other)))
                }
            };
            elements.push(element);
        }
        Ok(Path(elements))
    }

    fn attribute(&mut self) -> Result<PathElement> {
        let start = self.offset();
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            let valid = if name.is_empty() {
                c.is_ascii_alphabetic() || c == '_'
            } else {
                c.is_ascii_alphanumeric() || c == '_'
            };
            if !valid {
                break;
            }
            name.push(c);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error(start, "expected an attribute name"));
        }
        if name == TYPE_SELECTOR_NAME {
            Ok(PathElement::TypeSelector)
        } else {
            Ok(PathElement::Attribute(name))
        }
    }

    fn bracketed(&mut self) -> Result<PathElement> {
        let start = self.offset();
        let opening = self.chars.peek().map(|&(_, c)| c);
        let element = match opening {
            Some(quote) if quote == '"' || quote == '\'' => {
                self.chars.next();
                PathElement::Key(Key::Str(self.quoted(quote)?))
            }
            _ => {
                let mut token = String::new();
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == ']' {
                        break;
                    }
                    token.push(c);
                    self.chars.next();
                }
                self.literal(start, token.trim())?
            }
        };
        match self.chars.next() {
            Some((_, ']')) => Ok(element),
            Some((offset, c)) => Err(self.error(offset, format!("expected ']', found {:?}", c))),
            None => Err(self.error(self.input.len(), "unterminated '['")),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(out),
                Some((offset, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, c)) if c == '\\' || c == '"' || c == '\'' => out.push(c),
                    Some((_, c)) => {
                        return Err(self.error(offset, format!("unknown escape '\\{}'", c)))
                    }
                    None => return Err(self.error(offset, "dangling escape")),
                },
                Some((_, c)) => out.push(c),
                None => return Err(self.error(self.input.len(), "unterminated string key")),
            }
        }
    }

    fn literal(&self, offset: usize, token: &str) -> Result<PathElement> {
        match token {
            "true" => return Ok(PathElement::Key(Key::Bool(true))),
            "false" => return Ok(PathElement::Key(Key::Bool(false))),
            "" => return Err(self.error(offset, "empty brackets")),
            _ => {}
        }
        if let Ok(index) = token.parse::<usize>() {
            return Ok(PathElement::Index(index));
        }
        token
            .parse::<i64>()
            .map(|i| PathElement::Key(Key::Int(i)))
            .map_err(|_| self.error(offset, format!("invalid key literal {:?}", token)))
    }
}

/// Follow one path element from a container value
///
/// # Errors
///
/// Returns `PathKindMismatch` if the element does not fit the container kind
/// (including any element on a leaf), `PathNotFound` if the container has no
/// value there.
pub fn follow(store: &NodeStore, value: &Value, element: &PathElement) -> Result<Value> {
    let id = match value {
        Value::Node(id) => *id,
        Value::Leaf(scalar) => {
            return Err(DeltaError::PathKindMismatch {
                element: element.to_string(),
                found: scalar.kind_name().to_string(),
            })
        }
    };
    let node = store.get(id)?;
    let found = match (node, element) {
        (Node::Record(record), PathElement::Attribute(name)) => record.get(name).cloned(),
        (Node::Record(record), PathElement::TypeSelector) => {
            Some(Value::Leaf(Scalar::Str(record.type_name().to_string())))
        }
        (Node::Sequence(items), PathElement::Index(i)) => items.get(*i).cloned(),
        (Node::Mapping(entries), PathElement::Key(key)) => entries.get(key).cloned(),
        (other, _) => {
            return Err(DeltaError::PathKindMismatch {
                element: element.to_string(),
                found: other.kind().to_string(),
            })
        }
    };
    found.ok_or_else(|| DeltaError::PathNotFound {
        element: element.to_string(),
    })
}

/// Follow every element of a path from `root`
///
/// # Errors
///
/// Returns the first failure from [`follow`].
pub fn follow_path(store: &NodeStore, root: &Value, path: &Path) -> Result<Value> {
    path.elements()
        .iter()
        .try_fold(root.clone(), |value, element| follow(store, &value, element))
}
