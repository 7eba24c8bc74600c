use serde::Serialize;
use utoipa::ToSchema;

use crate::models::UserTask;

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskList {
    pub items: Vec<UserTask>,
}
