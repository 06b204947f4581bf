//! Role Preload Plans
//!
//! A plan lists what one role caches: the identity key for the subject's own
//! record and the collections to fetch and filter.

use crate::domain::Role;

use super::descriptor::{
    AudienceFilter, CollectionDescriptor, ExcludeSubject, OwnedBySubject, TeachesSubject,
    WithinSubjectScope,
};

/// Cache key holding the subject's role
pub const USER_ROLE_KEY: &str = "userRole";

/// Remote paths
pub const STUDENTS_PATH: &str = "Students";
pub const FACULTY_PATH: &str = "Faculty";
pub const ASSIGNMENTS_PATH: &str = "Assignments";
pub const NOTICES_PATH: &str = "Notices";

/// What a role caches during a preload cycle
#[derive(Debug, Clone)]
pub struct PreloadPlan {
    role: Role,
    identity_key: String,
    collections: Vec<CollectionDescriptor>,
}

impl PreloadPlan {
    pub fn new(role: Role, identity_key: impl Into<String>) -> Self {
        Self {
            role,
            identity_key: identity_key.into(),
            collections: Vec::new(),
        }
    }

    /// Append a collection
    pub fn with_collection(mut self, collection: CollectionDescriptor) -> Self {
        self.collections.push(collection);
        self
    }

    /// Teacher: assigned students, own assignments, colleagues, notices
    pub fn teacher() -> Self {
        Self::new(Role::Teacher, "teacherData")
            .with_collection(CollectionDescriptor::new(
                "assignedStudents",
                STUDENTS_PATH,
                WithinSubjectScope::default(),
            ))
            .with_collection(CollectionDescriptor::new(
                "teacherAssignments",
                ASSIGNMENTS_PATH,
                OwnedBySubject::default(),
            ))
            .with_collection(CollectionDescriptor::new(
                "facultyDirectory",
                FACULTY_PATH,
                ExcludeSubject,
            ))
            .with_collection(CollectionDescriptor::new("notices", NOTICES_PATH, AudienceFilter))
    }

    /// Student: class faculty, class assignments, classmates, notices
    pub fn student() -> Self {
        Self::new(Role::Student, "studentData")
            .with_collection(CollectionDescriptor::new(
                "facultyList",
                FACULTY_PATH,
                TeachesSubject,
            ))
            .with_collection(CollectionDescriptor::new(
                "studentAssignments",
                ASSIGNMENTS_PATH,
                WithinSubjectScope::default(),
            ))
            .with_collection(CollectionDescriptor::new(
                "classmates",
                STUDENTS_PATH,
                WithinSubjectScope {
                    exclude_subject: true,
                },
            ))
            .with_collection(CollectionDescriptor::new("notices", NOTICES_PATH, AudienceFilter))
    }

    /// Built-in plan for a role
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Teacher => Self::teacher(),
            Role::Student => Self::student(),
            Role::Parent => Self::new(Role::Parent, "parentData")
                .with_collection(CollectionDescriptor::new("notices", NOTICES_PATH, AudienceFilter)),
            Role::Admin => Self::new(Role::Admin, "adminData")
                .with_collection(CollectionDescriptor::new("notices", NOTICES_PATH, AudienceFilter)),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    /// Every key the plan writes: identity, role, then collections
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.collections.len() + 2);
        keys.push(self.identity_key.clone());
        keys.push(USER_ROLE_KEY.to_string());
        keys.extend(self.collections.iter().map(|c| c.key.clone()));
        keys
    }

    /// Progress steps in a cycle: identity, one per collection, completion
    pub fn total_steps(&self) -> usize {
        self.collections.len() + 2
    }
}
