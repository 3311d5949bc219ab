//! HTTP client for the e-learning platform's REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for auth, course, lecture, purchase, progress, and test
//! data. Authentication rides on a server-issued cookie: the client keeps
//! a cookie jar and sends the credential on every call, so there is no
//! token plumbing here.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::models::{
    Course, CourseDetailWithStatus, CourseProgress, CourseUpdate, Lecture, LectureUpdate,
    NewTest, Purchase, Test, TestResult, TestSubmission, User,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the platform.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the cookie jar is shared across clones.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g.
    /// `http://localhost:3000/api/v1`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Shared request core: builds the request, retries on 429 with
    /// exponential backoff, and parses the JSON body into `T`.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(String, String)]>,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(pairs) = query {
                request = request.query(pairs);
            }
            if let Some(value) = body {
                request = request.json(value);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(Method::GET, path, None, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        self.execute(Method::POST, path, None, Some(body)).await
    }

    // ===== Auth =====

    /// Create a new account. The server does not sign the caller in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let body = json!({ "name": name, "email": email, "password": password });
        let status: StatusResponse = self.post("/user/register", &body).await?;
        debug!(success = status.success, message = ?status.message, "Registered");
        Ok(())
    }

    /// Authenticate and return the signed-in user. On success the server
    /// sets the session cookie on this client's jar.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let body = json!({ "email": email, "password": password });
        let response: UserResponse = self.post("/user/login", &body).await?;
        debug!(user_id = %response.user.id, "Login succeeded");
        Ok(response.user)
    }

    /// Invalidate the server-side session.
    pub async fn logout(&self) -> Result<()> {
        let _: StatusResponse = self.get("/user/logout").await?;
        Ok(())
    }

    /// Fetch the profile of the currently signed-in user. Returns
    /// `ApiError::Unauthorized` when no server session exists; callers use
    /// this at startup to reconcile server state with the local session.
    pub async fn load_current_user(&self) -> Result<User> {
        let response: UserResponse = self.get("/user/profile").await?;
        Ok(response.user)
    }

    // ===== Courses =====

    pub async fn create_course(&self, title: &str, category: &str) -> Result<Course> {
        let body = json!({ "courseTitle": title, "category": category });
        let response: CourseResponse = self.post("/course", &body).await?;
        Ok(response.course)
    }

    pub async fn fetch_published_courses(&self) -> Result<Vec<Course>> {
        let response: CoursesResponse = self.get("/course/published-courses").await?;
        Ok(response.courses)
    }

    /// Courses created by the signed-in instructor.
    pub async fn fetch_creator_courses(&self) -> Result<Vec<Course>> {
        let response: CoursesResponse = self.get("/course").await?;
        Ok(response.courses)
    }

    pub async fn search_courses(
        &self,
        query: &str,
        categories: &[String],
        sort_by_price: Option<&str>,
    ) -> Result<Vec<Course>> {
        let mut pairs: Vec<(String, String)> = vec![("query".to_string(), query.to_string())];
        for category in categories {
            pairs.push(("categories".to_string(), category.clone()));
        }
        if let Some(sort) = sort_by_price {
            pairs.push(("sortByPrice".to_string(), sort.to_string()));
        }
        let response: CoursesResponse = self
            .execute(Method::GET, "/course/search", Some(&pairs), None)
            .await?;
        Ok(response.courses)
    }

    pub async fn fetch_course(&self, course_id: &str) -> Result<Course> {
        let response: CourseResponse = self.get(&format!("/course/{}", course_id)).await?;
        Ok(response.course)
    }

    pub async fn edit_course(&self, course_id: &str, update: &CourseUpdate) -> Result<Course> {
        let body = serde_json::to_value(update)?;
        let response: CourseResponse = self
            .execute(Method::PUT, &format!("/course/{}", course_id), None, Some(&body))
            .await?;
        Ok(response.course)
    }

    /// Toggle a course's published state.
    pub async fn publish_course(&self, course_id: &str, publish: bool) -> Result<()> {
        let pairs = [("publish".to_string(), publish.to_string())];
        let _: StatusResponse = self
            .execute(
                Method::PATCH,
                &format!("/course/{}", course_id),
                Some(&pairs),
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn remove_course(&self, course_id: &str) -> Result<()> {
        let _: StatusResponse = self
            .execute(Method::DELETE, &format!("/course/{}", course_id), None, None)
            .await?;
        Ok(())
    }

    // ===== Lectures =====

    pub async fn create_lecture(&self, course_id: &str, title: &str) -> Result<Lecture> {
        let body = json!({ "lectureTitle": title });
        let response: LectureResponse = self
            .post(&format!("/course/{}/lecture", course_id), &body)
            .await?;
        Ok(response.lecture)
    }

    pub async fn fetch_course_lectures(&self, course_id: &str) -> Result<Vec<Lecture>> {
        let response: LecturesResponse =
            self.get(&format!("/course/{}/lecture", course_id)).await?;
        Ok(response.lectures)
    }

    pub async fn edit_lecture(
        &self,
        course_id: &str,
        lecture_id: &str,
        update: &LectureUpdate,
    ) -> Result<Lecture> {
        let body = serde_json::to_value(update)?;
        let response: LectureResponse = self
            .post(
                &format!("/course/{}/lecture/{}", course_id, lecture_id),
                &body,
            )
            .await?;
        Ok(response.lecture)
    }

    pub async fn remove_lecture(&self, lecture_id: &str) -> Result<()> {
        let _: StatusResponse = self
            .execute(
                Method::DELETE,
                &format!("/course/lecture/{}", lecture_id),
                None,
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_lecture(&self, lecture_id: &str) -> Result<Lecture> {
        let response: LectureResponse =
            self.get(&format!("/course/lecture/{}", lecture_id)).await?;
        Ok(response.lecture)
    }

    // ===== Purchases =====

    /// Start a checkout for a course. Returns the payment gateway redirect
    /// URL; what happens there is the gateway's business, not ours.
    pub async fn create_checkout_session(&self, course_id: &str) -> Result<String> {
        let body = json!({ "courseId": course_id });
        let response: CheckoutResponse = self
            .post("/purchase/checkout/create-checkout-session", &body)
            .await?;
        Ok(response.url)
    }

    pub async fn fetch_course_detail_with_status(
        &self,
        course_id: &str,
    ) -> Result<CourseDetailWithStatus> {
        self.get(&format!("/purchase/course/{}/detail-with-status", course_id))
            .await
    }

    pub async fn fetch_purchased_courses(&self) -> Result<Vec<Purchase>> {
        let response: PurchasedCoursesResponse = self.get("/purchase").await?;
        Ok(response.purchases)
    }

    // ===== Progress =====

    pub async fn fetch_course_progress(&self, course_id: &str) -> Result<CourseProgress> {
        let response: ProgressResponse = self.get(&format!("/progress/{}", course_id)).await?;
        Ok(response.data)
    }

    pub async fn update_lecture_progress(&self, course_id: &str, lecture_id: &str) -> Result<()> {
        let _: StatusResponse = self
            .post(
                &format!("/progress/{}/lecture/{}/view", course_id, lecture_id),
                &json!({}),
            )
            .await?;
        Ok(())
    }

    pub async fn mark_course_completed(&self, course_id: &str) -> Result<()> {
        let _: StatusResponse = self
            .post(&format!("/progress/{}/complete", course_id), &json!({}))
            .await?;
        Ok(())
    }

    pub async fn mark_course_incompleted(&self, course_id: &str) -> Result<()> {
        let _: StatusResponse = self
            .post(&format!("/progress/{}/incomplete", course_id), &json!({}))
            .await?;
        Ok(())
    }

    // ===== Tests =====

    pub async fn create_test(&self, test: &NewTest) -> Result<Test> {
        let body = serde_json::to_value(test)?;
        let response: TestResponse = self.post("/test/create", &body).await?;
        Ok(response.test)
    }

    pub async fn fetch_tests_by_course(&self, course_id: &str) -> Result<Vec<Test>> {
        let response: TestsResponse = self.get(&format!("/test/course/{}", course_id)).await?;
        Ok(response.tests)
    }

    pub async fn fetch_test(&self, test_id: &str) -> Result<Test> {
        let response: TestResponse = self.get(&format!("/test/{}", test_id)).await?;
        Ok(response.test)
    }

    pub async fn delete_question(&self, test_id: &str, question_id: &str) -> Result<()> {
        let _: StatusResponse = self
            .execute(
                Method::DELETE,
                &format!("/test/{}/question/{}", test_id, question_id),
                None,
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn submit_test(&self, submission: &TestSubmission) -> Result<TestResult> {
        let body = serde_json::to_value(submission)?;
        let response: SubmitResponse = self.post("/test/submit", &body).await?;
        Ok(response.result)
    }

    pub async fn fetch_test_results(&self, course_id: &str) -> Result<Vec<TestResult>> {
        let response: TestResultsResponse =
            self.get(&format!("/test/result/{}", course_id)).await?;
        Ok(response.results)
    }
}

// Internal API response types for parsing

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: User,
}

#[derive(Debug, Deserialize)]
struct CoursesResponse {
    #[serde(default, alias = "data")]
    courses: Vec<Course>,
}

#[derive(Debug, Deserialize)]
struct CourseResponse {
    course: Course,
}

#[derive(Debug, Deserialize)]
struct LecturesResponse {
    #[serde(default)]
    lectures: Vec<Lecture>,
}

#[derive(Debug, Deserialize)]
struct LectureResponse {
    lecture: Lecture,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PurchasedCoursesResponse {
    #[serde(rename = "purchasedCourse", alias = "purchases", default)]
    purchases: Vec<Purchase>,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    data: CourseProgress,
}

#[derive(Debug, Deserialize)]
struct TestsResponse {
    #[serde(default)]
    tests: Vec<Test>,
}

#[derive(Debug, Deserialize)]
struct TestResponse {
    test: Test,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "testResult")]
    result: TestResult,
}

#[derive(Debug, Deserialize)]
struct TestResultsResponse {
    #[serde(rename = "testResults", alias = "results", default)]
    results: Vec<TestResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_login_response() {
        let json = r#"{
            "success": true,
            "message": "Welcome back Alice",
            "user": {
                "_id": "66b2f1",
                "name": "Alice",
                "email": "alice@example.com",
                "role": "student",
                "photoUrl": null
            }
        }"#;
        let response: UserResponse =
            serde_json::from_str(json).expect("Failed to parse login test JSON");
        assert_eq!(response.user.name, "Alice");
        assert_eq!(response.user.role.as_deref(), Some("student"));
    }

    #[test]
    fn test_parse_published_courses_response() {
        let json = r#"{
            "success": true,
            "courses": [
                {"_id": "c1", "courseTitle": "Rust for the Web", "isPublished": true},
                {"_id": "c2", "courseTitle": "Intro to SQL", "coursePrice": 299}
            ]
        }"#;
        let response: CoursesResponse =
            serde_json::from_str(json).expect("Failed to parse courses test JSON");
        assert_eq!(response.courses.len(), 2);
        assert!(response.courses[0].is_published);
        assert_eq!(response.courses[1].price, Some(299.0));
    }

    #[test]
    fn test_parse_purchased_courses_response() {
        let json = r#"{
            "purchasedCourse": [
                {
                    "_id": "p1",
                    "courseId": {"_id": "c1", "courseTitle": "Rust for the Web"},
                    "amount": 499,
                    "status": "completed"
                }
            ]
        }"#;
        let response: PurchasedCoursesResponse =
            serde_json::from_str(json).expect("Failed to parse purchases test JSON");
        assert_eq!(response.purchases.len(), 1);
        assert!(response.purchases[0].is_completed());
    }

    #[test]
    fn test_parse_status_response_defaults() {
        let response: StatusResponse = serde_json::from_str("{}").unwrap();
        assert!(!response.success);
        assert!(response.message.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:3000/api/v1/").unwrap();
        assert_eq!(client.url("/course"), "http://localhost:3000/api/v1/course");
    }
}
