/// Per-account task lists
///
/// Every operation is scoped by the account id taken from the route.

mod manager;

pub use manager::TaskManager;

use crate::{
    db::task::TaskFields,
    error::{ApiError, ApiResult},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Calendar date as sent by clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct DueDate {
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 1, max = 31))]
    pub day: u32,
}

impl DueDate {
    fn to_naive(self) -> ApiResult<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "due_date: {}-{:02}-{:02} is not a calendar date",
                self.year, self.month, self.day
            ))
        })
    }
}

/// Task create/update request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskRequest {
    #[validate(length(min = 1))]
    pub task_name: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(nested)]
    pub due_date: DueDate,
    #[validate(range(min = 1))]
    pub priority: i64,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRequest {
    /// Validate and convert into storable fields
    pub fn into_fields(self) -> ApiResult<TaskFields> {
        self.validate()?;
        Ok(TaskFields {
            due_date: self.due_date.to_naive()?,
            task_name: self.task_name,
            description: self.description,
            priority: self.priority,
            completed: self.completed,
        })
    }
}

/// Batch create request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskBatchRequest {
    #[validate(length(min = 1), nested)]
    pub todo_list: Vec<TaskRequest>,
}

impl TaskBatchRequest {
    /// Validate the whole batch and hand back its items
    pub fn into_requests(self) -> ApiResult<Vec<TaskRequest>> {
        self.validate()?;
        Ok(self.todo_list)
    }
}

/// Which tasks an id-scoped mutation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelector {
    One(i64),
    Many(Vec<i64>),
}

impl TaskSelector {
    pub fn ids(&self) -> &[i64] {
        match self {
            TaskSelector::One(id) => std::slice::from_ref(id),
            TaskSelector::Many(ids) => ids,
        }
    }
}
