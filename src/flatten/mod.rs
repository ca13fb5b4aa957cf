//! Flatten module
//!
//! Turns raw, deeply nested weather observations into flat typed rows.
//!
//! # Overview
//!
//! This module provides:
//! - `RawReader` - Lists and decodes raw documents from storage
//! - `unnest_document` - Unwraps the nested sections and rejoins them by synthetic id
//! - `TimestampPattern` - Parses `localObsDateTime` with a `yyyy-MM-dd h:mm a` style pattern
//! - `FlatRecord` - The typed output row
//! - `Flattener` - The batch job tying reading, flattening and partitioned writes together

mod document;
mod job;
mod record;
mod timestamp;
mod unnest;

pub use document::{decode_documents, RawDocument, RawReader, Undecodable};
pub use job::{flatten_documents, FlattenReport, Flattener, Rejection};
pub use record::{cast_f32, cast_i64, cast_string, FlatRecord, LOCAL_OBS_DATE_TIME};
pub use timestamp::TimestampPattern;
pub use unnest::{
    unnest_document, unwrap_or_default, unwrap_required, unwrap_single, Fragment, IdAllocator,
    RejectReason, Unwrapped, WideRow, DROPPED_CURRENT_CONDITION_FIELDS,
    DROPPED_NEAREST_AREA_FIELDS, DROPPED_ROOT_FIELDS, WRAPPED_AREA_FIELDS,
};
