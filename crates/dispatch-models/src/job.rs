//! Ready-made job type for dispatchers.
//!
//! A `Job` is a unit of pending work tagged with the group it belongs to
//! (a tenant, a project, a session) so the whole group can be evicted at
//! once when it is cancelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, JobId};
use crate::item::Item;

/// A unit of pending work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for the job.
    pub id: JobId,

    /// Group used for bulk eviction.
    pub group_id: GroupId,

    /// Lower is served first.
    pub priority: i64,

    /// Opaque payload; the heap never reads it.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,

    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Creates a job with a generated ID and an empty payload.
    pub fn new(group_id: impl Into<GroupId>, priority: i64) -> Self {
        Self {
            id: JobId::generate(),
            group_id: group_id.into(),
            priority,
            payload: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Replaces the generated ID.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

impl Item for Job {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn group_id(&self) -> &str {
        self.group_id.as_str()
    }
}
