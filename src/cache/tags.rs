//! The invalidation policy, in one place.
//!
//! Every cacheable read and every write is an enum variant here, and two
//! pure functions map them to cache tags: [`provided_tags`] says which tags
//! a query's result is registered under, [`invalidated_tags`] says which
//! tags a mutation wipes. Keeping the policy as data rather than scattered
//! calls makes it auditable: the rules below can be checked exhaustively.
//!
//! Rules:
//! - a mutation targeting one entity invalidates that entity's tag and the
//!   collection tag for its type;
//! - child collections are scoped by their parent (lectures, tests, results
//!   and progress all hang off a course), so mutations under one course
//!   never disturb another course's cached reads;
//! - a read embedding related data carries the related tags too (course
//!   detail embeds lectures, progress embeds the course), which is what
//!   makes cross-entity invalidation land.

/// A label identifying a class or instance of cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Course(String),
    CourseList,
    Lecture(String),
    /// Lectures of one course.
    Lectures(String),
    Test(String),
    /// Tests of one course.
    Tests(String),
    /// Test results of one course.
    TestResults(String),
    Purchase(String),
    PurchaseList,
    /// Playback progress in one course.
    Progress(String),
}

/// Cacheable reads, keyed by their parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    PublishedCourses,
    CreatorCourses,
    SearchCourses {
        query: String,
        categories: Vec<String>,
        sort_by_price: Option<String>,
    },
    CourseById(String),
    CourseLectures(String),
    LectureById(String),
    TestsByCourse(String),
    TestById(String),
    TestResultsByCourse(String),
    PurchasedCourses,
    CourseDetailWithStatus(String),
    CourseProgress(String),
}

/// Writes that must be reflected by subsequent reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateCourse,
    EditCourse { course_id: String },
    PublishCourse { course_id: String },
    RemoveCourse { course_id: String },
    CreateLecture { course_id: String },
    EditLecture { course_id: String, lecture_id: String },
    RemoveLecture { course_id: String, lecture_id: String },
    CreateTest { course_id: String },
    DeleteQuestion { course_id: String, test_id: String },
    SubmitTest { course_id: String },
    Checkout { course_id: String },
    UpdateLectureProgress { course_id: String },
    MarkCourseCompleted { course_id: String },
    MarkCourseIncompleted { course_id: String },
}

/// Tags a query's result is registered under.
pub fn provided_tags(query: &Query) -> Vec<Tag> {
    match query {
        Query::PublishedCourses | Query::CreatorCourses => vec![Tag::CourseList],
        Query::SearchCourses { .. } => vec![Tag::CourseList],
        Query::CourseById(id) => vec![Tag::Course(id.clone()), Tag::Lectures(id.clone())],
        Query::CourseLectures(course_id) => vec![Tag::Lectures(course_id.clone())],
        Query::LectureById(id) => vec![Tag::Lecture(id.clone())],
        Query::TestsByCourse(course_id) => vec![Tag::Tests(course_id.clone())],
        Query::TestById(id) => vec![Tag::Test(id.clone())],
        Query::TestResultsByCourse(course_id) => vec![Tag::TestResults(course_id.clone())],
        Query::PurchasedCourses => vec![Tag::PurchaseList],
        Query::CourseDetailWithStatus(course_id) => vec![
            Tag::Purchase(course_id.clone()),
            Tag::Course(course_id.clone()),
        ],
        Query::CourseProgress(course_id) => vec![
            Tag::Progress(course_id.clone()),
            Tag::Course(course_id.clone()),
            Tag::Lectures(course_id.clone()),
        ],
    }
}

/// Tags a mutation invalidates on success.
pub fn invalidated_tags(mutation: &Mutation) -> Vec<Tag> {
    match mutation {
        Mutation::CreateCourse => vec![Tag::CourseList],
        Mutation::EditCourse { course_id } | Mutation::PublishCourse { course_id } => {
            vec![Tag::Course(course_id.clone()), Tag::CourseList]
        }
        Mutation::RemoveCourse { course_id } => vec![
            Tag::Course(course_id.clone()),
            Tag::CourseList,
            Tag::Lectures(course_id.clone()),
        ],
        Mutation::CreateLecture { course_id } => vec![
            Tag::Course(course_id.clone()),
            Tag::Lectures(course_id.clone()),
        ],
        Mutation::EditLecture { course_id, lecture_id }
        | Mutation::RemoveLecture { course_id, lecture_id } => vec![
            Tag::Course(course_id.clone()),
            Tag::Lecture(lecture_id.clone()),
            Tag::Lectures(course_id.clone()),
        ],
        Mutation::CreateTest { course_id } => vec![Tag::Tests(course_id.clone())],
        Mutation::DeleteQuestion { course_id, test_id } => vec![
            Tag::Test(test_id.clone()),
            Tag::Tests(course_id.clone()),
        ],
        Mutation::SubmitTest { course_id } => vec![Tag::TestResults(course_id.clone())],
        Mutation::Checkout { course_id } => vec![
            Tag::Purchase(course_id.clone()),
            Tag::PurchaseList,
        ],
        Mutation::UpdateLectureProgress { course_id }
        | Mutation::MarkCourseCompleted { course_id }
        | Mutation::MarkCourseIncompleted { course_id } => {
            vec![Tag::Progress(course_id.clone())]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlap(a: &[Tag], b: &[Tag]) -> bool {
        a.iter().any(|tag| b.contains(tag))
    }

    #[test]
    fn test_course_mutations_hit_entity_and_list() {
        let mutation = Mutation::EditCourse { course_id: "c1".to_string() };
        let tags = invalidated_tags(&mutation);
        assert!(tags.contains(&Tag::Course("c1".to_string())));
        assert!(tags.contains(&Tag::CourseList));
    }

    #[test]
    fn test_lecture_mutation_reaches_parent_course() {
        // Course detail reads embed lecture data, so a lecture edit must
        // invalidate the parent's detail and lecture list.
        let mutation = Mutation::EditLecture {
            course_id: "c1".to_string(),
            lecture_id: "l1".to_string(),
        };
        let tags = invalidated_tags(&mutation);

        assert!(overlap(&tags, &provided_tags(&Query::CourseById("c1".to_string()))));
        assert!(overlap(&tags, &provided_tags(&Query::CourseLectures("c1".to_string()))));
        assert!(overlap(&tags, &provided_tags(&Query::LectureById("l1".to_string()))));
    }

    #[test]
    fn test_lecture_mutation_spares_unrelated_course() {
        let mutation = Mutation::EditLecture {
            course_id: "c1".to_string(),
            lecture_id: "l1".to_string(),
        };
        let tags = invalidated_tags(&mutation);

        assert!(!overlap(&tags, &provided_tags(&Query::CourseById("c2".to_string()))));
        assert!(!overlap(&tags, &provided_tags(&Query::CourseLectures("c2".to_string()))));
        assert!(!overlap(&tags, &provided_tags(&Query::LectureById("l2".to_string()))));
    }

    #[test]
    fn test_every_targeted_mutation_names_entity_and_collection() {
        // Audit: each id-targeted mutation invalidates the entity tag and
        // the matching collection tag.
        let cases: Vec<(Mutation, Tag, Tag)> = vec![
            (
                Mutation::EditCourse { course_id: "c".into() },
                Tag::Course("c".into()),
                Tag::CourseList,
            ),
            (
                Mutation::PublishCourse { course_id: "c".into() },
                Tag::Course("c".into()),
                Tag::CourseList,
            ),
            (
                Mutation::RemoveCourse { course_id: "c".into() },
                Tag::Course("c".into()),
                Tag::CourseList,
            ),
            (
                Mutation::EditLecture { course_id: "c".into(), lecture_id: "l".into() },
                Tag::Lecture("l".into()),
                Tag::Lectures("c".into()),
            ),
            (
                Mutation::RemoveLecture { course_id: "c".into(), lecture_id: "l".into() },
                Tag::Lecture("l".into()),
                Tag::Lectures("c".into()),
            ),
            (
                Mutation::DeleteQuestion { course_id: "c".into(), test_id: "t".into() },
                Tag::Test("t".into()),
                Tag::Tests("c".into()),
            ),
            (
                Mutation::Checkout { course_id: "c".into() },
                Tag::Purchase("c".into()),
                Tag::PurchaseList,
            ),
        ];

        for (mutation, entity, collection) in cases {
            let tags = invalidated_tags(&mutation);
            assert!(tags.contains(&entity), "{:?} misses {:?}", mutation, entity);
            assert!(tags.contains(&collection), "{:?} misses {:?}", mutation, collection);
        }
    }

    #[test]
    fn test_creations_invalidate_their_collection() {
        assert!(invalidated_tags(&Mutation::CreateCourse).contains(&Tag::CourseList));
        assert!(invalidated_tags(&Mutation::CreateLecture { course_id: "c".into() })
            .contains(&Tag::Lectures("c".into())));
        assert!(invalidated_tags(&Mutation::CreateTest { course_id: "c".into() })
            .contains(&Tag::Tests("c".into())));
    }

    #[test]
    fn test_progress_mutations_stay_scoped() {
        let tags = invalidated_tags(&Mutation::UpdateLectureProgress { course_id: "c1".into() });
        assert!(overlap(&tags, &provided_tags(&Query::CourseProgress("c1".into()))));
        assert!(!overlap(&tags, &provided_tags(&Query::CourseProgress("c2".into()))));
        // Progress writes don't touch catalog reads
        assert!(!overlap(&tags, &provided_tags(&Query::PublishedCourses)));
    }
}
