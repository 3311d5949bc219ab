//! The high-level client tying the pieces together.
//!
//! `Client` owns the API client, the session lifecycle controller, and the
//! resource cache. Reads go through the cache (registering their tags,
//! fetching on a miss) and mutations invalidate the tags listed for them
//! in the policy table. Any call the server answers with 401 terminates
//! the local session before the error propagates.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use futures::{future, stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthState, SessionController, SessionStore};
use crate::cache::{invalidated_tags, provided_tags, Mutation, Query, TagCache};
use crate::config::Config;
use crate::models::{
    Course, CourseDetailWithStatus, CourseProgress, CourseUpdate, Lecture, LectureUpdate,
    NewTest, Purchase, Test, TestResult, TestSubmission, User,
};
use crate::storage::FileStorage;

/// Maximum concurrent requests when warming the cache.
/// Limits parallel requests to avoid overwhelming the server or hitting
/// rate limits.
const MAX_CONCURRENT_REQUESTS: usize = 5;

pub struct Client {
    config: Config,
    api: ApiClient,
    session: SessionController,
    cache: TagCache,
}

impl Client {
    /// Build a client from `config`. Restores any live persisted session
    /// (and resumes its background revalidation) without touching the
    /// network; call [`Client::reconcile_session`] afterwards to let the
    /// server confirm or veto it.
    pub async fn new(config: Config) -> Result<Self> {
        let data_dir = config
            .data_dir()
            .unwrap_or_else(|_| PathBuf::from("./coursecache-data"));
        let storage = FileStorage::new(data_dir)?;
        let store = SessionStore::with_ttl(Box::new(storage), config.session_ttl());
        let session = SessionController::new(store, config.check_interval());
        let api = ApiClient::new(&config.api_base_url)?;

        if session.is_authenticated().await {
            session.start_revalidation().await;
        }

        Ok(Self {
            config,
            api,
            session,
            cache: TagCache::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The lifecycle controller. Reads are open to everyone; writes happen
    /// only through the controller's own transition API.
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub async fn auth_state(&self) -> AuthState {
        self.session.state().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.is_authenticated().await
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
        self.api.register(name, email, password).await
    }

    /// Authenticate against the server and open a local session.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self.api.login(email, password).await?;
        self.session.login(user.clone()).await;
        // Cached reads may belong to a previous account
        self.cache.clear();
        Ok(user)
    }

    /// End the session locally and, best-effort, server-side. The local
    /// state is Unauthenticated when this returns, whatever the network
    /// did.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.session.logout().await;
        self.cache.clear();
    }

    /// Ask the server who we are and fold the answer into local state:
    /// a user means a fresh local session, a 401 terminates the local one,
    /// and an unreachable server leaves the local session alone. Called
    /// once at startup; never fails.
    pub async fn reconcile_session(&self) -> AuthState {
        match self.api.load_current_user().await {
            Ok(user) => {
                info!(user_id = %user.id, "Server confirmed session");
                self.session.login(user).await;
            }
            Err(e) if is_auth_rejection(&e) => {
                self.session.handle_auth_rejection().await;
                self.cache.clear();
            }
            Err(e) => {
                warn!(error = %e, "Could not reconcile session with server, keeping local state");
            }
        }
        self.session.state().await
    }

    // =========================================================================
    // Courses
    // =========================================================================

    pub async fn published_courses(&self) -> Result<Vec<Course>> {
        self.cached(Query::PublishedCourses, || {
            self.api.fetch_published_courses()
        })
        .await
    }

    pub async fn creator_courses(&self) -> Result<Vec<Course>> {
        self.cached(Query::CreatorCourses, || self.api.fetch_creator_courses())
            .await
    }

    pub async fn search_courses(
        &self,
        query: &str,
        categories: &[String],
        sort_by_price: Option<&str>,
    ) -> Result<Vec<Course>> {
        let key = Query::SearchCourses {
            query: query.to_string(),
            categories: categories.to_vec(),
            sort_by_price: sort_by_price.map(str::to_string),
        };
        self.cached(key, || {
            self.api.search_courses(query, categories, sort_by_price)
        })
        .await
    }

    pub async fn course(&self, course_id: &str) -> Result<Course> {
        self.cached(Query::CourseById(course_id.to_string()), || {
            self.api.fetch_course(course_id)
        })
        .await
    }

    pub async fn create_course(&self, title: &str, category: &str) -> Result<Course> {
        self.mutate(Mutation::CreateCourse, || {
            self.api.create_course(title, category)
        })
        .await
    }

    pub async fn edit_course(&self, course_id: &str, update: &CourseUpdate) -> Result<Course> {
        let mutation = Mutation::EditCourse {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.edit_course(course_id, update))
            .await
    }

    pub async fn publish_course(&self, course_id: &str, publish: bool) -> Result<()> {
        let mutation = Mutation::PublishCourse {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.publish_course(course_id, publish))
            .await
    }

    pub async fn remove_course(&self, course_id: &str) -> Result<()> {
        let mutation = Mutation::RemoveCourse {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.remove_course(course_id))
            .await
    }

    /// Prefetch course details into the cache with bounded concurrency.
    /// Returns how many fetches succeeded; failures are left for the
    /// caller's next on-demand read to retry.
    pub async fn warm_course_cache(&self, course_ids: &[String]) -> usize {
        stream::iter(course_ids.iter().cloned())
            .map(|id| async move { self.course(&id).await.is_ok() })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .filter(|ok| future::ready(*ok))
            .count()
            .await
    }

    // =========================================================================
    // Lectures
    // =========================================================================

    pub async fn course_lectures(&self, course_id: &str) -> Result<Vec<Lecture>> {
        self.cached(Query::CourseLectures(course_id.to_string()), || {
            self.api.fetch_course_lectures(course_id)
        })
        .await
    }

    pub async fn lecture(&self, lecture_id: &str) -> Result<Lecture> {
        self.cached(Query::LectureById(lecture_id.to_string()), || {
            self.api.fetch_lecture(lecture_id)
        })
        .await
    }

    pub async fn create_lecture(&self, course_id: &str, title: &str) -> Result<Lecture> {
        let mutation = Mutation::CreateLecture {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.create_lecture(course_id, title))
            .await
    }

    pub async fn edit_lecture(
        &self,
        course_id: &str,
        lecture_id: &str,
        update: &LectureUpdate,
    ) -> Result<Lecture> {
        let mutation = Mutation::EditLecture {
            course_id: course_id.to_string(),
            lecture_id: lecture_id.to_string(),
        };
        self.mutate(mutation, || {
            self.api.edit_lecture(course_id, lecture_id, update)
        })
        .await
    }

    pub async fn remove_lecture(&self, course_id: &str, lecture_id: &str) -> Result<()> {
        let mutation = Mutation::RemoveLecture {
            course_id: course_id.to_string(),
            lecture_id: lecture_id.to_string(),
        };
        self.mutate(mutation, || self.api.remove_lecture(lecture_id))
            .await
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    pub async fn create_checkout_session(&self, course_id: &str) -> Result<String> {
        let mutation = Mutation::Checkout {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.create_checkout_session(course_id))
            .await
    }

    pub async fn course_detail_with_status(
        &self,
        course_id: &str,
    ) -> Result<CourseDetailWithStatus> {
        self.cached(Query::CourseDetailWithStatus(course_id.to_string()), || {
            self.api.fetch_course_detail_with_status(course_id)
        })
        .await
    }

    pub async fn purchased_courses(&self) -> Result<Vec<Purchase>> {
        self.cached(Query::PurchasedCourses, || {
            self.api.fetch_purchased_courses()
        })
        .await
    }

    // =========================================================================
    // Progress
    // =========================================================================

    pub async fn course_progress(&self, course_id: &str) -> Result<CourseProgress> {
        self.cached(Query::CourseProgress(course_id.to_string()), || {
            self.api.fetch_course_progress(course_id)
        })
        .await
    }

    pub async fn update_lecture_progress(&self, course_id: &str, lecture_id: &str) -> Result<()> {
        let mutation = Mutation::UpdateLectureProgress {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || {
            self.api.update_lecture_progress(course_id, lecture_id)
        })
        .await
    }

    pub async fn mark_course_completed(&self, course_id: &str) -> Result<()> {
        let mutation = Mutation::MarkCourseCompleted {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.mark_course_completed(course_id))
            .await
    }

    pub async fn mark_course_incompleted(&self, course_id: &str) -> Result<()> {
        let mutation = Mutation::MarkCourseIncompleted {
            course_id: course_id.to_string(),
        };
        self.mutate(mutation, || self.api.mark_course_incompleted(course_id))
            .await
    }

    // =========================================================================
    // Tests
    // =========================================================================

    pub async fn create_test(&self, test: &NewTest) -> Result<Test> {
        let mutation = Mutation::CreateTest {
            course_id: test.course_id.clone(),
        };
        self.mutate(mutation, || self.api.create_test(test)).await
    }

    pub async fn tests_by_course(&self, course_id: &str) -> Result<Vec<Test>> {
        self.cached(Query::TestsByCourse(course_id.to_string()), || {
            self.api.fetch_tests_by_course(course_id)
        })
        .await
    }

    pub async fn test(&self, test_id: &str) -> Result<Test> {
        self.cached(Query::TestById(test_id.to_string()), || {
            self.api.fetch_test(test_id)
        })
        .await
    }

    pub async fn delete_question(
        &self,
        course_id: &str,
        test_id: &str,
        question_id: &str,
    ) -> Result<()> {
        let mutation = Mutation::DeleteQuestion {
            course_id: course_id.to_string(),
            test_id: test_id.to_string(),
        };
        self.mutate(mutation, || self.api.delete_question(test_id, question_id))
            .await
    }

    pub async fn submit_test(&self, submission: &TestSubmission) -> Result<TestResult> {
        let mutation = Mutation::SubmitTest {
            course_id: submission.course_id.clone(),
        };
        self.mutate(mutation, || self.api.submit_test(submission))
            .await
    }

    pub async fn test_results(&self, course_id: &str) -> Result<Vec<TestResult>> {
        self.cached(Query::TestResultsByCourse(course_id.to_string()), || {
            self.api.fetch_test_results(course_id)
        })
        .await
    }

    // =========================================================================
    // Cache plumbing
    // =========================================================================

    /// Cache-first read: a surviving entry is returned as-is, otherwise
    /// the fetch runs and its result is registered under the query's tags.
    async fn cached<T, Fut>(&self, query: Query, fetch: impl FnOnce() -> Fut) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.cache.get(&query) {
            match serde_json::from_value(value) {
                Ok(data) => return Ok(data),
                // A shape mismatch means the entry predates a model change;
                // treat it as a miss and refetch.
                Err(e) => debug!(?query, error = %e, "Discarding undecodable cache entry"),
            }
        }

        match fetch().await {
            Ok(data) => {
                match serde_json::to_value(&data) {
                    Ok(value) => self.cache.insert(query.clone(), provided_tags(&query), value),
                    Err(e) => warn!(?query, error = %e, "Failed to serialize result for caching"),
                }
                Ok(data)
            }
            Err(e) => {
                self.observe_error(&e).await;
                Err(e)
            }
        }
    }

    /// Run a mutation and, on success, invalidate the tags the policy
    /// table lists for it.
    async fn mutate<T, Fut>(&self, mutation: Mutation, op: impl FnOnce() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match op().await {
            Ok(data) => {
                let removed = self.cache.invalidate(&invalidated_tags(&mutation));
                debug!(?mutation, removed, "Mutation committed, cache invalidated");
                Ok(data)
            }
            Err(e) => {
                self.observe_error(&e).await;
                Err(e)
            }
        }
    }

    /// Inspect a failed call for the server's auth-rejection signal and
    /// terminate the local session when it appears.
    async fn observe_error(&self, error: &anyhow::Error) {
        if is_auth_rejection(error) {
            self.session.handle_auth_rejection().await;
            self.cache.clear();
        }
    }
}

/// Whether `error` carries an `ApiError::Unauthorized` anywhere in its
/// chain (context wrapping must not hide the signal).
fn is_auth_rejection(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_auth_rejection)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DEFAULT_CHECK_INTERVAL;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn test_client() -> Client {
        let store = SessionStore::new(Box::new(MemoryStorage::new()));
        Client {
            config: Config::default(),
            api: ApiClient::new("http://localhost:9").unwrap(),
            session: SessionController::new(store, DEFAULT_CHECK_INTERVAL),
            cache: TagCache::new(),
        }
    }

    fn test_course(id: &str, title: &str) -> Course {
        serde_json::from_value(json!({ "_id": id, "courseTitle": title }))
            .expect("course fixture")
    }

    fn test_user(name: &str) -> User {
        serde_json::from_value(json!({
            "_id": format!("u-{name}"),
            "name": name,
            "email": format!("{name}@example.com"),
        }))
        .expect("user fixture")
    }

    #[tokio::test]
    async fn test_cached_read_skips_second_fetch() {
        let client = test_client();

        let first: Vec<Course> = client
            .cached(Query::PublishedCourses, || async {
                Ok(vec![test_course("c1", "Rust for the Web")])
            })
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // A cache hit must not run the fetch at all
        let second: Vec<Course> = client
            .cached(Query::PublishedCourses, || async {
                panic!("fetch ran despite a cached entry")
            })
            .await
            .unwrap();
        assert_eq!(second[0].id, "c1");
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_session_and_caches_nothing() {
        let client = test_client();
        client.session.login(test_user("alice")).await;

        let result: Result<Vec<Course>> = client
            .cached(Query::PublishedCourses, || async {
                Err(anyhow::anyhow!("connection refused"))
            })
            .await;

        assert!(result.is_err());
        assert!(client.cache.is_empty());
        // A plain network error is a soft failure, not an auth rejection
        assert!(client.session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cached_reads() {
        let client = test_client();

        let _: Vec<Lecture> = client
            .cached(Query::CourseLectures("c1".into()), || async { Ok(vec![]) })
            .await
            .unwrap();
        let _: Vec<Lecture> = client
            .cached(Query::CourseLectures("c2".into()), || async { Ok(vec![]) })
            .await
            .unwrap();
        assert_eq!(client.cache.len(), 2);

        let mutation = Mutation::CreateLecture { course_id: "c1".into() };
        client.mutate(mutation, || async { Ok(()) }).await.unwrap();

        // c1's list dropped, c2's untouched
        assert!(client.cache.get(&Query::CourseLectures("c1".into())).is_none());
        assert!(client.cache.get(&Query::CourseLectures("c2".into())).is_some());
    }

    #[tokio::test]
    async fn test_auth_rejection_terminates_session_and_cache() {
        let client = test_client();
        client.session.login(test_user("alice")).await;
        let _: Vec<Course> = client
            .cached(Query::PublishedCourses, || async {
                Ok(vec![test_course("c1", "Rust for the Web")])
            })
            .await
            .unwrap();

        let result: Result<()> = client
            .mutate(Mutation::CreateCourse, || async {
                Err(anyhow::Error::from(ApiError::Unauthorized).context("create course"))
            })
            .await;

        assert!(result.is_err());
        assert!(!client.session.is_authenticated().await);
        assert!(client.cache.is_empty());
    }

    #[test]
    fn test_is_auth_rejection_sees_through_context() {
        let wrapped = anyhow::Error::from(ApiError::Unauthorized).context("while fetching");
        assert!(is_auth_rejection(&wrapped));

        let other = anyhow::Error::from(ApiError::RateLimited).context("while fetching");
        assert!(!is_auth_rejection(&other));

        assert!(!is_auth_rejection(&anyhow::anyhow!("plain failure")));
    }
}
