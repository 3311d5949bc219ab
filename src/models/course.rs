use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "courseTitle")]
    pub title: String,
    #[serde(rename = "subTitle")]
    pub sub_title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "courseLevel")]
    pub level: Option<String>,
    #[serde(rename = "coursePrice")]
    pub price: Option<f64>,
    #[serde(rename = "courseThumbnail")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "isPublished", default)]
    pub is_published: bool,
    pub creator: Option<CourseCreator>,
    #[serde(rename = "enrolledStudents", default)]
    pub enrolled_students: Vec<String>,
    /// Populated on detail reads; list reads leave it empty.
    #[serde(default)]
    pub lectures: Vec<Lecture>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

impl Course {
    pub fn enrolled_count(&self) -> usize {
        self.enrolled_students.len()
    }

    /// Price for display; unset means the course is free.
    pub fn price_display(&self) -> String {
        match self.price {
            Some(p) => format!("₹{:.0}", p),
            None => "Free".to_string(),
        }
    }
}

/// Creator reference as embedded in course reads (server-side populate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseCreator {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lecture {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "lectureTitle")]
    pub title: String,
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    #[serde(rename = "publicId")]
    pub public_id: Option<String>,
    #[serde(rename = "isPreviewFree")]
    pub is_preview_free: Option<bool>,
}

impl Lecture {
    pub fn is_playable_without_purchase(&self) -> bool {
        self.is_preview_free.unwrap_or(false)
    }
}

/// Fields accepted by the course edit endpoint. Unset fields are left
/// unchanged server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CourseUpdate {
    #[serde(rename = "courseTitle", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "subTitle", skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "courseLevel", skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(rename = "coursePrice", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "courseThumbnail", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Fields accepted by the lecture edit endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LectureUpdate {
    #[serde(rename = "lectureTitle", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "videoUrl", skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(rename = "isPreviewFree", skip_serializing_if = "Option::is_none")]
    pub is_preview_free: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_course_detail() {
        let json = r#"{
            "_id": "c1",
            "courseTitle": "Rust for the Web",
            "subTitle": "From zero to deployed",
            "category": "Programming",
            "courseLevel": "Beginner",
            "coursePrice": 499,
            "isPublished": true,
            "creator": {"_id": "u9", "name": "Priya", "photoUrl": null},
            "enrolledStudents": ["s1", "s2"],
            "lectures": [
                {"_id": "l1", "lectureTitle": "Intro", "videoUrl": "https://v/1", "isPreviewFree": true}
            ]
        }"#;
        let course: Course = serde_json::from_str(json).expect("Failed to parse course JSON");
        assert_eq!(course.title, "Rust for the Web");
        assert_eq!(course.enrolled_count(), 2);
        assert_eq!(course.lectures.len(), 1);
        assert!(course.lectures[0].is_playable_without_purchase());
        assert_eq!(course.price_display(), "₹499");
    }

    #[test]
    fn test_course_update_skips_unset_fields() {
        let update = CourseUpdate {
            title: Some("New title".to_string()),
            price: Some(0.0),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["courseTitle"], "New title");
        assert!(value.get("description").is_none());
        assert!(value.get("subTitle").is_none());
    }
}
