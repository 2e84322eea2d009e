//! The commit node of the history DAG.
//!
//! A commit is stored as a struct named `Commit` with exactly two fields:
//! `value` (anything) and `parents` (a set of refs typed as commits). Any
//! other shape is rejected by [`Commit::from_value`].

use vdb_types::Hash;

use crate::error::{DatasError, DatasResult};
use crate::value::{Ref, Struct, TypeDesc, Value};

/// Struct name that marks a value as a commit.
pub const COMMIT_STRUCT_NAME: &str = "Commit";

const VALUE_FIELD: &str = "value";
const PARENTS_FIELD: &str = "parents";

/// A node in the commit DAG.
#[derive(Clone, Debug, PartialEq)]
pub struct Commit {
    value: Value,
    /// Sorted by target, no duplicates.
    parents: Vec<Ref>,
}

impl Commit {
    /// Create a commit. Parents are deduplicated by target hash.
    pub fn new(value: Value, parents: impl IntoIterator<Item = Ref>) -> Self {
        let mut parents: Vec<Ref> = parents.into_iter().collect();
        parents.sort_by(|a, b| a.target.cmp(&b.target));
        parents.dedup_by(|a, b| a.target == b.target);
        Self { value, parents }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn parents(&self) -> &[Ref] {
        &self.parents
    }

    pub fn parent_hashes(&self) -> Vec<Hash> {
        self.parents.iter().map(|p| p.target).collect()
    }

    /// Returns `true` for a first commit.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// The struct value this commit is stored as.
    pub fn to_value(&self) -> Value {
        let parents = Value::set(self.parents.iter().cloned().map(Value::Ref));
        Struct::new(COMMIT_STRUCT_NAME)
            .with_field(PARENTS_FIELD, parents)
            .with_field(VALUE_FIELD, self.value.clone())
            .into()
    }

    /// Interpret a value as a commit.
    pub fn from_value(value: &Value) -> DatasResult<Self> {
        let Some(s) = value.as_struct() else {
            return Err(DatasError::NotACommit(format!(
                "expected struct {COMMIT_STRUCT_NAME}, got {}",
                value.type_desc()
            )));
        };
        if s.name != COMMIT_STRUCT_NAME {
            return Err(DatasError::NotACommit(format!(
                "expected struct {COMMIT_STRUCT_NAME}, got struct {}",
                s.name
            )));
        }
        if s.fields.len() != 2 {
            return Err(DatasError::NotACommit(format!(
                "expected fields {{{PARENTS_FIELD}, {VALUE_FIELD}}}, got {} fields",
                s.fields.len()
            )));
        }
        let (Some(inner), Some(parents)) = (s.get(VALUE_FIELD), s.get(PARENTS_FIELD)) else {
            return Err(DatasError::NotACommit(format!(
                "missing {VALUE_FIELD} or {PARENTS_FIELD} field"
            )));
        };
        let Value::Set(items) = parents else {
            return Err(DatasError::NotACommit(format!(
                "{PARENTS_FIELD} must be a set, got {}",
                parents.type_desc()
            )));
        };

        let commit_type = TypeDesc::commit();
        let mut refs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Ref(r) if r.target_type == commit_type => refs.push(r.clone()),
                other => {
                    return Err(DatasError::NotACommit(format!(
                        "parent must be a ref to {commit_type}, got {}",
                        describe(other)
                    )))
                }
            }
        }
        Ok(Self::new(inner.clone(), refs))
    }

    /// Returns `true` if `value` has the commit shape.
    pub fn is_commit(value: &Value) -> bool {
        Self::from_value(value).is_ok()
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Ref(r) => format!("ref to {}", r.target_type),
        other => other.type_desc().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_ref(seed: &[u8]) -> Ref {
        Ref::new(Hash::of(seed), TypeDesc::commit())
    }

    #[test]
    fn value_roundtrip_keeps_parents() {
        let commit = Commit::new(Value::from("v"), [commit_ref(b"b"), commit_ref(b"a")]);
        let decoded = Commit::from_value(&commit.to_value()).unwrap();
        assert_eq!(decoded, commit);
        assert_eq!(decoded.parents().len(), 2);
        assert!(!decoded.is_root());
    }

    #[test]
    fn duplicate_parents_collapse() {
        let commit = Commit::new(Value::from(1.0), [commit_ref(b"a"), commit_ref(b"a")]);
        assert_eq!(commit.parent_hashes(), vec![Hash::of(b"a")]);
    }

    #[test]
    fn first_commit_is_root() {
        let commit = Commit::new(Value::from(true), []);
        assert!(commit.is_root());
        assert!(Commit::is_commit(&commit.to_value()));
    }

    #[test]
    fn bool_is_not_a_commit() {
        let err = Commit::from_value(&Value::from(true)).unwrap_err();
        assert!(matches!(err, DatasError::NotACommit(_)));
    }

    #[test]
    fn wrong_struct_name_is_rejected() {
        let v: Value = Struct::new("NotCommit")
            .with_field(VALUE_FIELD, Value::from(1.0))
            .with_field(PARENTS_FIELD, Value::set([]))
            .into();
        assert!(!Commit::is_commit(&v));
    }

    #[test]
    fn extra_field_is_rejected() {
        let v: Value = Struct::new(COMMIT_STRUCT_NAME)
            .with_field(VALUE_FIELD, Value::from(1.0))
            .with_field(PARENTS_FIELD, Value::set([]))
            .with_field("meta", Value::from("x"))
            .into();
        assert!(!Commit::is_commit(&v));
    }

    #[test]
    fn parents_must_be_commit_refs() {
        let list_ref = Ref::new(Hash::of(b"l"), TypeDesc::List);
        let v: Value = Struct::new(COMMIT_STRUCT_NAME)
            .with_field(VALUE_FIELD, Value::from(1.0))
            .with_field(PARENTS_FIELD, Value::set([Value::Ref(list_ref)]))
            .into();
        let err = Commit::from_value(&v).unwrap_err();
        assert!(err.to_string().contains("ref to List"));
    }

    #[test]
    fn parents_must_be_a_set() {
        let v: Value = Struct::new(COMMIT_STRUCT_NAME)
            .with_field(VALUE_FIELD, Value::from(1.0))
            .with_field(PARENTS_FIELD, Value::list([]))
            .into();
        assert!(!Commit::is_commit(&v));
    }
}
