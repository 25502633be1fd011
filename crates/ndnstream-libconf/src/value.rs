//! Libconfig document tree.

use std::fmt;

/// A libconfig setting value.
///
/// Arrays (`[...]`) hold scalars of one type; lists (`(...)`) hold any
/// values. Both are kept distinct so documents round-trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    /// Integer written with an `L` suffix
    Int64(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    List(Vec<Value>),
    Group(Group),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) | Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Elements of an array or list.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) | Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_items_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Array(items) | Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Int64(_) => "int64",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::List(_) => "list",
            Self::Group(_) => "group",
        }
    }

    pub(crate) fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::List(_) | Self::Group(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Group> for Value {
    fn from(g: Group) -> Self {
        Self::Group(g)
    }
}

/// An ordered set of named settings.
///
/// The document root is a group. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    entries: Vec<(String, Value)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replaces an existing setting in place or appends a new one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Returns the named subgroup, creating it when absent.
    ///
    /// Returns `None` if a non-group setting already uses the name.
    pub fn group_entry(&mut self, name: &str) -> Option<&mut Group> {
        if self.get(name).is_none() {
            self.entries.push((name.to_string(), Value::Group(Group::new())));
        }
        self.get_mut(name).and_then(Value::as_group_mut)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, name: String, value: Value) {
        self.entries.push((name, value));
    }
}

impl fmt::Display for Group {
    /// Writes the group as a libconfig document.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::emit::write_settings(f, self, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut group = Group::new();
        group.set("a", 1i64);
        group.set("b", "two");
        group.set("a", 3i64);

        let names: Vec<&str> = group.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(group.get("a").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn test_group_entry_creates_and_refuses_scalars() {
        let mut group = Group::new();
        group.group_entry("general").unwrap().set("log_level", "default");
        assert_eq!(
            group
                .get("general")
                .and_then(Value::as_group)
                .and_then(|g| g.get("log_level"))
                .and_then(Value::as_str),
            Some("default")
        );

        group.set("scalar", true);
        assert!(group.group_entry("scalar").is_none());
    }

    #[test]
    fn test_remove() {
        let mut group = Group::new();
        group.set("x", 1i64);
        assert_eq!(group.remove("x"), Some(Value::Int(1)));
        assert!(group.is_empty());
        assert_eq!(group.remove("x"), None);
    }
}
