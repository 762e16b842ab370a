//! Want/have fact differencing.
//!
//! Two expanded fact documents compare into a [`Relation`]: four buckets
//! holding the fields found only in want, matching in both, differing, and
//! found only in have. Differing leaves keep both sides as a [`DiffNode::Pair`].
//! The buckets mirror the documents' nesting, so synthesis can project the
//! relation of any sub-field with [`Relation::find`].
//!
//! After comparison, every bucket entry keyed by a composite identity gets
//! its key fields re-injected ([`add_mandatory_keys`]); matching key values
//! land in the match bucket, so the other buckets would otherwise lose the
//! identity needed to address the entry on the device.

use indexmap::IndexMap;
use serde_json::Value;

use crate::paths::split_composite_key;

/// A node of the difference tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffNode {
    /// A leaf present in one bucket with a single value.
    Scalar(Value),
    /// A differing leaf: the want side and the have side.
    Pair {
        /// Value from the want document.
        base: Value,
        /// Value from the have document.
        comparable: Value,
    },
    /// Nested fields.
    Map(IndexMap<String, DiffNode>),
}

impl DiffNode {
    /// Converts a fact value into a difference node.
    pub fn from_value(value: &Value) -> DiffNode {
        match value {
            Value::Object(object) => DiffNode::Map(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), DiffNode::from_value(v)))
                    .collect(),
            ),
            other => DiffNode::Scalar(other.clone()),
        }
    }

    /// Borrows the nested fields, when this node has them.
    pub fn as_map(&self) -> Option<&IndexMap<String, DiffNode>> {
        match self {
            DiffNode::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrows the nested fields.
    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, DiffNode>> {
        match self {
            DiffNode::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The want-side value of a leaf.
    pub fn base_value(&self) -> Option<&Value> {
        match self {
            DiffNode::Scalar(v) => Some(v),
            DiffNode::Pair { base, .. } => Some(base),
            DiffNode::Map(_) => None,
        }
    }

    /// The have-side value of a leaf.
    pub fn comparable_value(&self) -> Option<&Value> {
        match self {
            DiffNode::Scalar(v) => Some(v),
            DiffNode::Pair { comparable, .. } => Some(comparable),
            DiffNode::Map(_) => None,
        }
    }
}

/// One bucket of a relation.
pub type Bucket = Option<DiffNode>;

/// The four-way difference between a want and a have document.
#[derive(Debug, Clone, Default)]
pub struct Relation {
    /// Fields only the want document has.
    pub want_only: Bucket,
    /// Fields equal in both documents.
    pub matched: Bucket,
    /// Fields present in both with differing values.
    pub changed: Bucket,
    /// Fields only the have document has.
    pub have_only: Bucket,
}

impl Relation {
    /// Compares two expanded fact documents.
    pub fn compare(want: &Value, have: &Value) -> Relation {
        let mut relation = match (non_empty_object(want), non_empty_object(have)) {
            (None, None) => Relation::default(),
            (None, Some(_)) => Relation {
                have_only: Some(DiffNode::from_value(have)),
                ..Relation::default()
            },
            (Some(_), None) => Relation {
                want_only: Some(DiffNode::from_value(want)),
                ..Relation::default()
            },
            (Some(want_obj), Some(have_obj)) => {
                let (want_only, matched, changed) = compare_objects(want_obj, have_obj);
                let have_only = new_nodes(have_obj, want_obj);
                Relation {
                    want_only: want_only.map(DiffNode::Map),
                    matched: matched.map(DiffNode::Map),
                    changed: changed.map(DiffNode::Map),
                    have_only: have_only.map(DiffNode::Map),
                }
            }
        };

        for bucket in [
            &mut relation.want_only,
            &mut relation.matched,
            &mut relation.changed,
            &mut relation.have_only,
        ] {
            if let Some(DiffNode::Map(map)) = bucket {
                add_mandatory_keys(map);
            }
        }
        relation
    }

    /// Projects the relation of one nested field.
    pub fn find(&self, name: &str) -> Relation {
        let project = |bucket: &Bucket| -> Bucket {
            bucket
                .as_ref()
                .and_then(DiffNode::as_map)
                .and_then(|m| m.get(name))
                .cloned()
        };
        Relation {
            want_only: project(&self.want_only),
            matched: project(&self.matched),
            changed: project(&self.changed),
            have_only: project(&self.have_only),
        }
    }

    /// Folds the have-only bucket into the match bucket, letting delete
    /// walks address fields want never named.
    pub fn have_only_as_matched(&self) -> Relation {
        let mut out = self.clone();
        match (out.matched.take(), out.have_only.take()) {
            (Some(DiffNode::Map(mut matched)), Some(DiffNode::Map(have))) => {
                for (key, node) in have {
                    matched.entry(key).or_insert(node);
                }
                out.matched = Some(DiffNode::Map(matched));
            }
            (None, have) => out.matched = have,
            (matched, have) => {
                out.matched = matched;
                out.have_only = have;
            }
        }
        out
    }

    /// True when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        fn empty(bucket: &Bucket) -> bool {
            match bucket {
                None => true,
                Some(DiffNode::Map(map)) => map.is_empty(),
                Some(_) => false,
            }
        }
        empty(&self.want_only)
            && empty(&self.matched)
            && empty(&self.changed)
            && empty(&self.have_only)
    }

    /// Drops match-bucket entries with no counterpart in any other bucket.
    /// Replace and override leave those entries untouched on the device.
    pub fn ignore_match_only(&mut self) {
        let others: Vec<String> = [&self.want_only, &self.changed, &self.have_only]
            .iter()
            .flat_map(|b| bucket_keys(b))
            .collect();
        if let Some(DiffNode::Map(map)) = &mut self.matched {
            map.retain(|key, _| others.iter().any(|k| k == key));
        }
    }
}

/// Keys of a bucket's top level, in order.
pub fn bucket_keys(bucket: &Bucket) -> Vec<String> {
    bucket
        .as_ref()
        .and_then(DiffNode::as_map)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// Borrows one entry of a bucket.
pub fn bucket_get<'a>(bucket: &'a Bucket, key: &str) -> Option<&'a DiffNode> {
    bucket.as_ref().and_then(DiffNode::as_map).and_then(|m| m.get(key))
}

/// Removes and returns one entry of a bucket.
pub fn bucket_pop(bucket: &mut Bucket, key: &str) -> Option<DiffNode> {
    bucket
        .as_mut()
        .and_then(DiffNode::as_map_mut)
        .and_then(|m| m.shift_remove(key))
}

fn non_empty_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    value.as_object().filter(|o| !o.is_empty())
}

type ObjectBuckets = (
    Option<IndexMap<String, DiffNode>>,
    Option<IndexMap<String, DiffNode>>,
    Option<IndexMap<String, DiffNode>>,
);

fn compare_objects(
    want: &serde_json::Map<String, Value>,
    have: &serde_json::Map<String, Value>,
) -> ObjectBuckets {
    let mut want_only = IndexMap::new();
    let mut matched = IndexMap::new();
    let mut changed = IndexMap::new();

    for (key, want_item) in want {
        let Some(have_item) = have.get(key) else {
            want_only.insert(key.clone(), DiffNode::from_value(want_item));
            continue;
        };
        match (want_item.as_object(), have_item.as_object()) {
            (Some(want_obj), Some(have_obj)) => {
                let (w, m, c) = compare_objects(want_obj, have_obj);
                if let Some(w) = w {
                    want_only.insert(key.clone(), DiffNode::Map(w));
                }
                if let Some(m) = m {
                    matched.insert(key.clone(), DiffNode::Map(m));
                }
                if let Some(c) = c {
                    changed.insert(key.clone(), DiffNode::Map(c));
                }
            }
            _ => {
                if want_item == have_item {
                    matched.insert(key.clone(), DiffNode::Scalar(want_item.clone()));
                } else {
                    changed.insert(
                        key.clone(),
                        DiffNode::Pair {
                            base: want_item.clone(),
                            comparable: have_item.clone(),
                        },
                    );
                }
            }
        }
    }

    (
        Some(want_only).filter(|m| !m.is_empty()),
        Some(matched).filter(|m| !m.is_empty()),
        Some(changed).filter(|m| !m.is_empty()),
    )
}

/// Fields of `have` absent from `want`, recursively.
fn new_nodes(
    have: &serde_json::Map<String, Value>,
    want: &serde_json::Map<String, Value>,
) -> Option<IndexMap<String, DiffNode>> {
    let mut only = IndexMap::new();
    for (key, have_item) in have {
        match want.get(key) {
            None => {
                only.insert(key.clone(), DiffNode::from_value(have_item));
            }
            Some(want_item) => {
                if let (Some(have_obj), Some(want_obj)) =
                    (have_item.as_object(), want_item.as_object())
                {
                    if let Some(nested) = new_nodes(have_obj, want_obj) {
                        only.insert(key.clone(), DiffNode::Map(nested));
                    }
                }
            }
        }
    }
    Some(only).filter(|m| !m.is_empty())
}

/// Re-injects composite-key fields into every keyed entry.
fn add_mandatory_keys(map: &mut IndexMap<String, DiffNode>) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        if key.contains(crate::paths::KEY_VALUE_SEPARATOR) {
            if let Some(DiffNode::Map(entry)) = map.get_mut(&key) {
                for (name, value) in split_composite_key(&key) {
                    if !entry.contains_key(name) {
                        entry.insert(
                            name.to_string(),
                            DiffNode::Scalar(Value::String(value.to_string())),
                        );
                    }
                }
            }
        }
        if let Some(DiffNode::Map(entry)) = map.get_mut(&key) {
            add_mandatory_keys(entry);
        }
    }
}
