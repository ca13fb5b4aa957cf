//! Unnesting and recombination of raw observation documents
//!
//! A raw document has a fixed shape: two single-element arrays
//! (`current_condition`, `nearest_area`), the second of which holds three
//! more single-element arrays wrapping a `value` string. Each array is
//! unwrapped into a [`Fragment`] that carries the synthetic id its parent
//! references, and the fragments are joined back on those ids into one wide
//! row per document.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Top-level sections that carry no output fields
pub const DROPPED_ROOT_FIELDS: &[&str] = &["request", "weather"];

/// Fields of `current_condition` that are discarded unread
pub const DROPPED_CURRENT_CONDITION_FIELDS: &[&str] = &["weatherDesc", "weatherIconUrl"];

/// Fields of `nearest_area` that are discarded unread
pub const DROPPED_NEAREST_AREA_FIELDS: &[&str] = &["weatherUrl"];

/// Wrapped scalars inside `nearest_area`
pub const WRAPPED_AREA_FIELDS: &[&str] = &["areaName", "country", "region"];

const CURRENT_CONDITION: &str = "current_condition";
const NEAREST_AREA: &str = "nearest_area";

/// Why a document was left out of the batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("section '{field}' is missing")]
    Missing { field: String },

    #[error("section '{field}' is not an array")]
    NotAnArray { field: String },

    #[error("section '{field}' is empty")]
    Empty { field: String },

    #[error("section '{field}' has {count} elements, expected exactly one")]
    MultipleElements { field: String, count: usize },

    #[error("element of '{field}' is not an object")]
    ElementNotObject { field: String },

    #[error("fragment {child_id} does not match reference '{column}'")]
    JoinMismatch { column: String, child_id: i64 },
}

/// Shape of a single-element wrapping array
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unwrapped<'a> {
    /// Field absent or null
    Missing,
    /// Field present but not an array
    NotAnArray,
    /// Array with no elements
    Empty,
    /// Array with exactly one element
    One(&'a Value),
    /// Array with more than one element
    Many(usize),
}

/// Classify `parent[field]` as a wrapping array
pub fn unwrap_single<'a>(parent: &'a Map<String, Value>, field: &str) -> Unwrapped<'a> {
    match parent.get(field) {
        None | Some(Value::Null) => Unwrapped::Missing,
        Some(Value::Array(items)) => match items.as_slice() {
            [] => Unwrapped::Empty,
            [only] => Unwrapped::One(only),
            many => Unwrapped::Many(many.len()),
        },
        Some(_) => Unwrapped::NotAnArray,
    }
}

/// Unwrap a section that must hold exactly one record
pub fn unwrap_required<'a>(
    parent: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Map<String, Value>, RejectReason> {
    let field_name = || field.to_string();
    match unwrap_single(parent, field) {
        Unwrapped::One(Value::Object(record)) => Ok(record),
        Unwrapped::One(_) => Err(RejectReason::ElementNotObject { field: field_name() }),
        Unwrapped::Missing => Err(RejectReason::Missing { field: field_name() }),
        Unwrapped::NotAnArray => Err(RejectReason::NotAnArray { field: field_name() }),
        Unwrapped::Empty => Err(RejectReason::Empty { field: field_name() }),
        Unwrapped::Many(count) => Err(RejectReason::MultipleElements {
            field: field_name(),
            count,
        }),
    }
}

/// Unwrap a section that may be absent; absent or empty yields `None`
///
/// A present element must still be an object.
pub fn unwrap_or_default<'a>(
    parent: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>, RejectReason> {
    match unwrap_single(parent, field) {
        Unwrapped::One(Value::Object(record)) => Ok(Some(record)),
        Unwrapped::One(_) => Err(RejectReason::ElementNotObject {
            field: field.to_string(),
        }),
        Unwrapped::Missing | Unwrapped::Empty => Ok(None),
        Unwrapped::NotAnArray => Err(RejectReason::NotAnArray {
            field: field.to_string(),
        }),
        Unwrapped::Many(count) => Err(RejectReason::MultipleElements {
            field: field.to_string(),
            count,
        }),
    }
}

/// Hands out batch-unique synthetic ids
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    /// Start allocating from 1
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id
    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// One level of an unnested document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    /// Synthetic id; equals the parent's reference column value
    pub id: i64,
    /// Position within the parent array
    pub index: usize,
    /// Scalar columns
    pub fields: Map<String, Value>,
    /// Join bookkeeping: reference ids and indexes keyed by column
    pub refs: BTreeMap<String, i64>,
}

impl Fragment {
    /// Create an empty fragment
    pub fn new(id: i64, index: usize) -> Self {
        Self {
            id,
            index,
            ..Self::default()
        }
    }

    /// Copy the scalar fields of `record`, skipping `excluded` and every
    /// nested array or object
    fn with_scalars(mut self, record: &Map<String, Value>, excluded: &[&str]) -> Self {
        for (key, value) in record {
            if excluded.contains(&key.as_str()) || value.is_array() || value.is_object() {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
        self
    }

    /// Record that `column` references the fragment with `child_id`
    fn reference(&mut self, column: &str, child_id: i64) {
        self.refs.insert(column.to_string(), child_id);
    }

    /// Join a child fragment onto this one through the `column` reference
    ///
    /// Child columns are renamed to `<column>.<name>`.
    pub fn join(&mut self, column: &str, child: Fragment) -> Result<(), RejectReason> {
        if self.refs.get(column) != Some(&child.id) {
            return Err(RejectReason::JoinMismatch {
                column: column.to_string(),
                child_id: child.id,
            });
        }

        for (key, value) in child.fields {
            self.fields.insert(format!("{column}.{key}"), value);
        }
        for (key, id) in child.refs {
            self.refs.insert(format!("{column}.{key}"), id);
        }
        self.refs.insert(format!("{column}.id"), child.id);
        self.refs
            .insert(format!("{column}.index"), i64::try_from(child.index).unwrap_or(i64::MAX));
        Ok(())
    }

    /// Drop all join bookkeeping, keeping only business columns
    pub fn into_row(self) -> WideRow {
        WideRow {
            id: self.id,
            fields: self.fields,
        }
    }
}

/// A fully recombined document with join bookkeeping removed
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    /// Synthetic id of the source document
    pub id: i64,
    /// Business columns keyed by dotted source path
    pub fields: Map<String, Value>,
}

impl WideRow {
    /// Look up a column by dotted source path
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}

/// Unwrap `current_condition` into a fragment with id `ref_id`
fn unnest_current_condition(
    root: &Map<String, Value>,
    ref_id: i64,
) -> Result<Fragment, RejectReason> {
    let record = unwrap_required(root, CURRENT_CONDITION)?;
    Ok(Fragment::new(ref_id, 0).with_scalars(record, DROPPED_CURRENT_CONDITION_FIELDS))
}

/// Unwrap `nearest_area` and its wrapped scalars into one fragment
fn unnest_nearest_area(
    root: &Map<String, Value>,
    ref_id: i64,
    ids: &mut IdAllocator,
) -> Result<Fragment, RejectReason> {
    let record = unwrap_required(root, NEAREST_AREA)?;

    let mut excluded: Vec<&str> = DROPPED_NEAREST_AREA_FIELDS.to_vec();
    excluded.extend_from_slice(WRAPPED_AREA_FIELDS);
    let mut area = Fragment::new(ref_id, 0).with_scalars(record, &excluded);

    for field in WRAPPED_AREA_FIELDS {
        let Some(wrapped) = unwrap_or_default(record, field)? else {
            continue;
        };

        let child_id = ids.next_id();
        area.reference(field, child_id);

        let mut child = Fragment::new(child_id, 0);
        if let Some(value) = wrapped.get("value").filter(|v| !v.is_null()) {
            child.fields.insert("value".to_string(), value.clone());
        }
        area.join(field, child)?;
    }

    Ok(area)
}

/// Unnest one document and recombine it into a wide row
///
/// `doc_id` is the document's synthetic id; nested fragments draw their ids
/// from `ids`.
pub fn unnest_document(
    doc_id: i64,
    document: &Value,
    ids: &mut IdAllocator,
) -> Result<WideRow, RejectReason> {
    let root = document.as_object().ok_or(RejectReason::NotAnObject)?;

    let current_ref = ids.next_id();
    let area_ref = ids.next_id();

    let current = unnest_current_condition(root, current_ref)?;
    let area = unnest_nearest_area(root, area_ref, ids)?;

    let mut excluded: Vec<&str> = DROPPED_ROOT_FIELDS.to_vec();
    excluded.extend_from_slice(&[CURRENT_CONDITION, NEAREST_AREA]);
    let mut wide = Fragment::new(doc_id, 0).with_scalars(root, &excluded);

    wide.reference(CURRENT_CONDITION, current_ref);
    wide.reference(NEAREST_AREA, area_ref);
    wide.join(CURRENT_CONDITION, current)?;
    wide.join(NEAREST_AREA, area)?;

    Ok(wide.into_row())
}
