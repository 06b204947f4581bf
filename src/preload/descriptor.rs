//! Collection Descriptors
//!
//! A [`CollectionDescriptor`] names one cached collection: the cache key it
//! lands under, the remote path it is read from, and the [`RecordFilter`]
//! that reduces it to the records relevant to the signed-in subject.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::{Role, Subject};
use crate::matching::{self, AssignmentScope};

/// Owner fields checked by [`OwnedBySubject`] when none are given
pub const DEFAULT_OWNER_FIELDS: [&str; 4] = ["teacherId", "createdBy", "facultyId", "ownerId"];

/// Audience values accepted by every role
const AUDIENCE_EVERYONE: &str = "all";

/// What a filter knows about the subject
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub subject_id: String,
    pub role: Role,
    /// The subject's own record
    pub record: Value,
    /// Years and divisions the subject is assigned to (or enrolled in)
    pub scope: AssignmentScope,
}

impl FilterContext {
    pub fn for_subject(subject: &Subject) -> Self {
        Self {
            subject_id: subject.id.clone(),
            role: subject.role,
            record: subject.record.clone(),
            scope: AssignmentScope::from_record(&subject.record),
        }
    }
}

/// Decides whether a remote record is relevant to the subject
pub trait RecordFilter: Send + Sync + fmt::Debug {
    fn select(&self, ctx: &FilterContext, id: &str, record: &Value) -> bool;
}

// =============================================================================
// Filters
// =============================================================================

/// Keeps every record
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RecordFilter for AcceptAll {
    fn select(&self, _ctx: &FilterContext, _id: &str, _record: &Value) -> bool {
        true
    }
}

/// Keeps every record except the subject's own
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeSubject;

impl RecordFilter for ExcludeSubject {
    fn select(&self, ctx: &FilterContext, id: &str, _record: &Value) -> bool {
        id != ctx.subject_id
    }
}

/// Keeps records whose year/division fall inside the subject's scope.
///
/// Used for a teacher's students, a student's classmates and class
/// assignments.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithinSubjectScope {
    pub exclude_subject: bool,
}

impl RecordFilter for WithinSubjectScope {
    fn select(&self, ctx: &FilterContext, id: &str, record: &Value) -> bool {
        if self.exclude_subject && id == ctx.subject_id {
            return false;
        }
        ctx.scope.matches_record(record)
    }
}

/// Keeps faculty whose assigned years/divisions cover the subject's class
#[derive(Debug, Clone, Copy, Default)]
pub struct TeachesSubject;

impl RecordFilter for TeachesSubject {
    fn select(&self, ctx: &FilterContext, _id: &str, record: &Value) -> bool {
        AssignmentScope::from_record(record).matches_record(&ctx.record)
    }
}

/// Keeps records whose owner field names the subject
#[derive(Debug, Clone)]
pub struct OwnedBySubject {
    fields: Vec<String>,
}

impl OwnedBySubject {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for OwnedBySubject {
    fn default() -> Self {
        Self::new(DEFAULT_OWNER_FIELDS)
    }
}

impl RecordFilter for OwnedBySubject {
    fn select(&self, ctx: &FilterContext, _id: &str, record: &Value) -> bool {
        self.fields.iter().any(|field| {
            record
                .get(field.as_str())
                .map(matching::to_string_list)
                .is_some_and(|owners| owners.iter().any(|owner| owner == &ctx.subject_id))
        })
    }
}

/// Keeps notices addressed to everyone or to the subject's role.
///
/// A notice without an `audience` field is addressed to everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudienceFilter;

impl RecordFilter for AudienceFilter {
    fn select(&self, ctx: &FilterContext, _id: &str, record: &Value) -> bool {
        let audience = match record.get("audience") {
            Some(value) => matching::to_string_list(value),
            None => return true,
        };
        audience.iter().any(|a| {
            let a = a.trim().to_lowercase();
            a == AUDIENCE_EVERYONE || a == ctx.role.as_str() || a == ctx.role.directory_path().to_lowercase()
        })
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// One cached collection
#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    /// Cache key the filtered list is stored under
    pub key: String,
    /// Remote record store path
    pub path: String,
    pub filter: Arc<dyn RecordFilter>,
}

impl CollectionDescriptor {
    pub fn new(
        key: impl Into<String>,
        path: impl Into<String>,
        filter: impl RecordFilter + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            filter: Arc::new(filter),
        }
    }

    /// Filter `records` in chunks of `chunk_size`, yielding to the runtime
    /// between chunks, and project the survivors into view objects.
    ///
    /// Input order is preserved.
    pub async fn select(
        &self,
        ctx: &FilterContext,
        records: &[(String, Value)],
        chunk_size: usize,
    ) -> Vec<Value> {
        let mut selected = Vec::new();
        for chunk in records.chunks(chunk_size.max(1)) {
            selected.extend(
                chunk
                    .iter()
                    .filter(|(id, record)| self.filter.select(ctx, id, record))
                    .map(|(id, record)| project(id, record)),
            );
            tokio::task::yield_now().await;
        }
        selected
    }
}

/// Flatten a remote collection into `(id, record)` pairs in source order.
///
/// Objects are keyed by id; arrays use the element index. Null entries are
/// skipped and scalars hold no records.
pub fn flatten_records(collection: &Value) -> Vec<(String, Value)> {
    match collection {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// `{"id": <id>, ...fields}`. A record's own `id` field wins.
pub fn project(id: &str, record: &Value) -> Value {
    let mut view = Map::new();
    view.insert("id".to_string(), Value::String(id.to_string()));
    match record {
        Value::Object(fields) => {
            for (k, v) in fields {
                view.insert(k.clone(), v.clone());
            }
        }
        other => {
            view.insert("value".to_string(), other.clone());
        }
    }
    Value::Object(view)
}
