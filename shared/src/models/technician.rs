//! Device types each technician is allowed to handle

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Device types a technician works on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechnicianAssignment {
    pub user_id: Uuid,
    pub device_type_ids: Vec<i64>,
}

impl TechnicianAssignment {
    pub fn new(user_id: Uuid, mut device_type_ids: Vec<i64>) -> Self {
        device_type_ids.sort_unstable();
        device_type_ids.dedup();
        Self {
            user_id,
            device_type_ids,
        }
    }

    pub fn can_handle(&self, device_type_id: i64) -> bool {
        self.device_type_ids.binary_search(&device_type_id).is_ok()
    }
}

/// Check a user may handle devices of a type.
///
/// A user with no assignment on record is not restricted.
pub fn check_technician(
    assignment: Option<&TechnicianAssignment>,
    device_type_id: i64,
) -> DomainResult<()> {
    match assignment {
        Some(assignment) if !assignment.can_handle(device_type_id) => {
            Err(DomainError::TechnicianNotAssigned {
                user_id: assignment.user_id,
                device_type_id,
            })
        }
        _ => Ok(()),
    }
}
