//! Device faults found and fixed during repair

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFault {
    pub id: i64,
    pub device_id: Uuid,
    pub fault_description: String,
    pub solution_description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub reported_by: Uuid,
    pub repaired_by: Option<Uuid>,
}

impl DeviceFault {
    /// Close the fault with its solution
    pub fn resolve(&mut self, solution: String, actor: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        if self.completed {
            return Err(DomainError::InvalidTransition(format!(
                "fault F-{} is already resolved",
                self.id
            )));
        }
        if solution.trim().is_empty() {
            return Err(DomainError::validation("solution_description", "Solution cannot be empty"));
        }
        self.solution_description = Some(solution);
        self.ended_at = Some(at);
        self.completed = true;
        self.repaired_by = Some(actor);
        Ok(())
    }
}
