use serde::{Deserialize, Serialize};

use super::Course;

/// A student's progress through one course, as returned by the progress
/// endpoint: the course detail plus per-lecture view state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseProgress {
    #[serde(rename = "courseDetails")]
    pub course_details: Course,
    #[serde(default)]
    pub progress: Vec<LectureProgress>,
    #[serde(default)]
    pub completed: bool,
}

impl CourseProgress {
    pub fn viewed_count(&self) -> usize {
        self.progress.iter().filter(|p| p.viewed).count()
    }

    /// Fraction of the course's lectures viewed, in 0..=1.
    pub fn completion_ratio(&self) -> f64 {
        let total = self.course_details.lectures.len();
        if total == 0 {
            0.0
        } else {
            self.viewed_count() as f64 / total as f64
        }
    }

    pub fn is_lecture_viewed(&self, lecture_id: &str) -> bool {
        self.progress
            .iter()
            .any(|p| p.lecture_id == lecture_id && p.viewed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LectureProgress {
    #[serde(rename = "lectureId")]
    pub lecture_id: String,
    #[serde(default)]
    pub viewed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_and_ratio() {
        let json = r#"{
            "courseDetails": {
                "_id": "c1",
                "courseTitle": "Rust for the Web",
                "lectures": [
                    {"_id": "l1", "lectureTitle": "Intro"},
                    {"_id": "l2", "lectureTitle": "Setup"}
                ]
            },
            "progress": [
                {"lectureId": "l1", "viewed": true},
                {"lectureId": "l2", "viewed": false}
            ],
            "completed": false
        }"#;
        let progress: CourseProgress =
            serde_json::from_str(json).expect("Failed to parse progress JSON");
        assert_eq!(progress.viewed_count(), 1);
        assert!((progress.completion_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(progress.is_lecture_viewed("l1"));
        assert!(!progress.is_lecture_viewed("l2"));
    }
}
