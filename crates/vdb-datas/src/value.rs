//! The value graph stored in chunks.
//!
//! Values are trees of scalars, containers and structs. A [`Ref`] leaf
//! points at another value stored in its own chunk; refs are the only edges
//! sync follows between chunks. Sets and maps are kept in a canonical order
//! so that equal collections encode to identical bytes (and hashes).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use vdb_types::Hash;

use crate::commit::COMMIT_STRUCT_NAME;

/// Coarse type of a value, carried by refs so a reader knows what it expects
/// to find at the other end.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeDesc {
    Bool,
    Number,
    String,
    List,
    Set,
    Map,
    Ref,
    /// A struct, identified by name.
    Struct(String),
}

impl TypeDesc {
    /// The type of a commit struct.
    pub fn commit() -> Self {
        Self::Struct(COMMIT_STRUCT_NAME.to_string())
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Bool"),
            Self::Number => write!(f, "Number"),
            Self::String => write!(f, "String"),
            Self::List => write!(f, "List"),
            Self::Set => write!(f, "Set"),
            Self::Map => write!(f, "Map"),
            Self::Ref => write!(f, "Ref"),
            Self::Struct(name) => write!(f, "Struct<{name}>"),
        }
    }
}

/// Typed pointer to a value stored in its own chunk.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub target: Hash,
    pub target_type: TypeDesc,
}

impl Ref {
    pub fn new(target: Hash, target_type: TypeDesc) -> Self {
        Self {
            target,
            target_type,
        }
    }

    /// Ref to a value whose chunk hash is `target`.
    pub fn to_value(value: &Value, target: Hash) -> Self {
        Self::new(target, value.type_desc())
    }
}

/// Named record with fields kept in key order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A value stored in the database.
///
/// Build sets and maps with [`Value::set`] and [`Value::map`], which sort
/// and deduplicate their elements into canonical order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Ref(Ref),
    Struct(Struct),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Canonical set: sorted, duplicates removed.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut items: Vec<Value> = items.into_iter().collect();
        items.sort_by(canonical_cmp);
        items.dedup_by(|a, b| canonical_cmp(a, b) == Ordering::Equal);
        Self::Set(items)
    }

    /// Canonical map: sorted by key; for duplicate keys the last entry wins.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut sorted: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            match sorted.binary_search_by(|(k, _)| canonical_cmp(k, &key)) {
                Ok(pos) => sorted[pos].1 = value,
                Err(pos) => sorted.insert(pos, (key, value)),
            }
        }
        Self::Map(sorted)
    }

    /// Copy of this map with `key` set to `value`. Non-map values are
    /// returned unchanged.
    pub fn map_insert(&self, key: Value, value: Value) -> Self {
        match self {
            Self::Map(entries) => {
                Self::map(entries.iter().cloned().chain(std::iter::once((key, value))))
            }
            other => other.clone(),
        }
    }

    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Self::Bool(_) => TypeDesc::Bool,
            Self::Number(_) => TypeDesc::Number,
            Self::String(_) => TypeDesc::String,
            Self::List(_) => TypeDesc::List,
            Self::Set(_) => TypeDesc::Set,
            Self::Map(_) => TypeDesc::Map,
            Self::Ref(_) => TypeDesc::Ref,
            Self::Struct(s) => TypeDesc::Struct(s.name.clone()),
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Every ref held inline in this value, through nested containers and
    /// struct fields. Refs are not followed.
    pub fn child_refs(&self) -> Vec<Ref> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, out: &mut Vec<Ref>) {
        match self {
            Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
            Self::List(items) | Self::Set(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Self::Map(entries) => {
                for (key, value) in entries {
                    key.collect_refs(out);
                    value.collect_refs(out);
                }
            }
            Self::Ref(r) => out.push(r.clone()),
            Self::Struct(s) => {
                for value in s.fields.values() {
                    value.collect_refs(out);
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Self::Ref(r)
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Self::Struct(s)
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::List(_) => 3,
        Value::Set(_) => 4,
        Value::Map(_) => 5,
        Value::Ref(_) => 6,
        Value::Struct(_) => 7,
    }
}

/// Total order used to canonicalize sets and maps.
pub fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) | (Value::Set(x), Value::Set(y)) => cmp_seq(x, y),
        (Value::Map(x), Value::Map(y)) => {
            for ((xk, xv), (yk, yv)) in x.iter().zip(y) {
                let ord = canonical_cmp(xk, yk).then_with(|| canonical_cmp(xv, yv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Ref(x), Value::Ref(y)) => x
            .target
            .cmp(&y.target)
            .then_with(|| x.target_type.cmp(&y.target_type)),
        (Value::Struct(x), Value::Struct(y)) => x.name.cmp(&y.name).then_with(|| {
            for ((xk, xv), (yk, yv)) in x.fields.iter().zip(&y.fields) {
                let ord = xk.cmp(yk).then_with(|| canonical_cmp(xv, yv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.fields.len().cmp(&y.fields.len())
        }),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn cmp_seq(x: &[Value], y: &[Value]) -> Ordering {
    for (a, b) in x.iter().zip(y) {
        let ord = canonical_cmp(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(seed: &[u8]) -> Ref {
        Ref::new(Hash::of(seed), TypeDesc::List)
    }

    #[test]
    fn set_is_sorted_and_deduplicated() {
        let a = Value::set([Value::from(2.0), Value::from(1.0), Value::from(2.0)]);
        let b = Value::set([Value::from(1.0), Value::from(2.0)]);
        assert_eq!(a, b);
        assert!(matches!(a, Value::Set(ref items) if items.len() == 2));
    }

    #[test]
    fn map_last_write_wins() {
        let m = Value::map([
            (Value::from("k"), Value::from(1.0)),
            (Value::from("a"), Value::from(true)),
            (Value::from("k"), Value::from(2.0)),
        ]);
        let Value::Map(entries) = &m else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Value::from("a"));
        assert_eq!(entries[1].1, Value::from(2.0));
    }

    #[test]
    fn map_insert_matches_fresh_construction() {
        let base = Value::map([(Value::from("first"), Value::from(1.0))]);
        let updated = base.map_insert(Value::from("second"), Value::from(2.0));
        let fresh = Value::map([
            (Value::from("second"), Value::from(2.0)),
            (Value::from("first"), Value::from(1.0)),
        ]);
        assert_eq!(updated, fresh);
        assert_eq!(Value::from(true).map_insert(Value::from("x"), Value::from(1.0)), Value::from(true));
    }

    #[test]
    fn mixed_kinds_order_by_kind() {
        let s = Value::set([Value::from("s"), Value::from(true), Value::from(0.5)]);
        let Value::Set(items) = s else {
            panic!("expected set");
        };
        assert_eq!(items[0], Value::from(true));
        assert_eq!(items[1], Value::from(0.5));
        assert_eq!(items[2], Value::from("s"));
    }

    #[test]
    fn child_refs_walks_nested_containers() {
        let value = Value::list([
            Value::list([Value::Ref(r(b"list"))]),
            Value::set([Value::Ref(r(b"set"))]),
            Value::map([(Value::Ref(r(b"key")), Value::Ref(r(b"val")))]),
            Struct::new("S").with_field("f", Value::Ref(r(b"field"))).into(),
            Value::from(1.0),
        ]);
        let targets: Vec<Hash> = value.child_refs().into_iter().map(|r| r.target).collect();
        assert_eq!(targets.len(), 5);
        let seeds: [&[u8]; 5] = [b"list", b"set", b"key", b"val", b"field"];
        for seed in seeds {
            assert!(targets.contains(&Hash::of(seed)));
        }
    }

    #[test]
    fn scalars_have_no_refs() {
        assert!(Value::from("x").child_refs().is_empty());
    }

    #[test]
    fn type_desc_of_struct_carries_name() {
        let v: Value = Struct::new("Commit").into();
        assert_eq!(v.type_desc(), TypeDesc::commit());
        assert_eq!(TypeDesc::commit().to_string(), "Struct<Commit>");
    }
}
