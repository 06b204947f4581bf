//! Preload Orchestration
//!
//! Warms the cache with everything a signed-in subject needs, driven by a
//! per-role [`PreloadPlan`] of [`CollectionDescriptor`]s.
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = Arc::new(PreloadOrchestrator::new(cache, records, events, config)?);
//! let mut progress = orchestrator.subscribe_progress();
//! let subject = orchestrator.load_subject(Role::Teacher, "t1").await?;
//!
//! match orchestrator.preload_all_data(&subject).await {
//!     PreloadOutcome::Ran(report) => println!("{:?}", report.outcome),
//!     PreloadOutcome::Fresh | PreloadOutcome::Skipped => {}
//! }
//! ```

mod descriptor;
mod orchestrator;
mod plan;
mod progress;

pub use descriptor::{
    flatten_records, project, AcceptAll, AudienceFilter, CollectionDescriptor, ExcludeSubject,
    FilterContext, OwnedBySubject, RecordFilter, TeachesSubject, WithinSubjectScope,
    DEFAULT_OWNER_FIELDS,
};
pub use orchestrator::{
    CollectionReport, CycleOutcome, PreloadOrchestrator, PreloadOutcome, PreloadReport,
    PreloadState,
};
pub use plan::{
    PreloadPlan, ASSIGNMENTS_PATH, FACULTY_PATH, NOTICES_PATH, STUDENTS_PATH, USER_ROLE_KEY,
};
pub use progress::{ProgressBroadcaster, ProgressEvent, ProgressSubscription};
