use serde::{Deserialize, Serialize};

use super::Course;

/// Purchase states reported by the server.
pub const PURCHASE_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    #[serde(rename = "_id")]
    pub id: String,
    /// Populated course object (server-side populate on `courseId`).
    #[serde(rename = "courseId")]
    pub course: Option<Course>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Purchase {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(PURCHASE_COMPLETED)
    }
}

/// Course detail bundled with the caller's purchase state, as returned by
/// the detail-with-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetailWithStatus {
    pub course: Course,
    #[serde(default)]
    pub purchased: bool,
}
