//! Sample data and read models over the university tables
//!
//! Related rows are loaded explicitly, one query per relation. Every read of
//! students goes through the default filter, so removed students disappear
//! from addresses' owners, course rosters and enrollment counts alike.

use serde_json::json;
use std::collections::HashMap;
use store_object::{
    Entity, EntityId, EntryId, QueryFilter, RawQuery, SortOrder, StoreContext, StoreError,
};
use tracing::info;

use super::entities::{Course, Enrollment, Note, Student, StudentAddress, StudentCourse};

/// Keys of the seeded rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seeded {
    pub john: EntityId,
    pub stuart: EntityId,
    pub computer_programming: EntityId,
    pub artificial_intelligence: EntityId,
}

/// A student together with the related rows loaded for it
#[derive(Debug, Clone, PartialEq)]
pub struct StudentDetails {
    pub student: Student,
    pub address: Option<StudentAddress>,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseEnrollment {
    pub name: String,
    pub students: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentAge {
    pub id: EntityId,
    pub name: String,
    pub created_minutes_ago: i64,
}

fn assigned_key<T: Entity>(
    context: &StoreContext,
    entry_id: EntryId,
) -> Result<EntityId, StoreError> {
    context
        .entry::<T>(entry_id)
        .map(|entity| entity.id())
        .ok_or_else(|| StoreError::NotFound(format!("{} entry {}", T::table_name(), entry_id)))
}

/// Insert John (address, two notes, two courses) and Stuart (address, one
/// course)
///
/// Owners are saved first so the dependent rows can carry their keys.
pub async fn seed(context: &mut StoreContext) -> Result<Seeded, StoreError> {
    let computer_programming = context.add(Course::new("Computer Programming"))?;
    let artificial_intelligence = context.add(Course::new("Artificial Intelligence"))?;
    let john = context.add(Student::new("John", 21))?;
    let stuart = context.add(Student::new("Stuart", 23))?;
    context.save_changes().await?;

    let seeded = Seeded {
        john: assigned_key::<Student>(context, john)?,
        stuart: assigned_key::<Student>(context, stuart)?,
        computer_programming: assigned_key::<Course>(context, computer_programming)?,
        artificial_intelligence: assigned_key::<Course>(context, artificial_intelligence)?,
    };

    context.add(StudentAddress::new(seeded.john, "John address"))?;
    context.add(StudentAddress::new(seeded.stuart, "Stuart address"))?;
    context.add(Note::new(seeded.john, "Computer programming notes..."))?;
    context.add(Note::new(seeded.john, "Artificial Intelligence notes..."))?;
    context.add(Enrollment::new(seeded.john, seeded.computer_programming))?;
    context.add(Enrollment::new(seeded.john, seeded.artificial_intelligence))?;
    context.add(Enrollment::new(seeded.stuart, seeded.computer_programming))?;
    let written = context.save_changes().await?;

    info!(related = written, "University sample data seeded");
    Ok(seeded)
}

pub async fn address_of(
    context: &StoreContext,
    student_id: EntityId,
) -> Result<Option<StudentAddress>, StoreError> {
    context
        .query::<StudentAddress>()
        .filter(QueryFilter::eq("student_id", json!(student_id)))
        .first()
        .await
}

pub async fn notes_of(context: &StoreContext, student_id: EntityId) -> Result<Vec<Note>, StoreError> {
    context
        .query::<Note>()
        .filter(QueryFilter::eq("student_id", json!(student_id)))
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await
}

/// Courses a student is enrolled in, by course key
pub async fn courses_of(context: &StoreContext, student_id: EntityId) -> Result<Vec<Course>, StoreError> {
    let enrollments = context
        .query::<Enrollment>()
        .filter(QueryFilter::eq("student_id", json!(student_id)))
        .to_list()
        .await?;
    if enrollments.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<_> = enrollments.iter().map(|e| json!(e.course_id)).collect();
    context
        .query::<Course>()
        .filter(QueryFilter::in_values("id", keys))
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await
}

/// Visible students enrolled in a course
pub async fn students_of(context: &StoreContext, course_id: EntityId) -> Result<Vec<Student>, StoreError> {
    let enrollments = context
        .query::<Enrollment>()
        .filter(QueryFilter::eq("course_id", json!(course_id)))
        .to_list()
        .await?;
    if enrollments.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<_> = enrollments.iter().map(|e| json!(e.student_id)).collect();
    context
        .query::<Student>()
        .filter(QueryFilter::in_values("id", keys))
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await
}

/// Every visible student with address and courses
pub async fn student_details(context: &StoreContext) -> Result<Vec<StudentDetails>, StoreError> {
    let students = context
        .query::<Student>()
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await?;

    let mut details = Vec::with_capacity(students.len());
    for student in students {
        let address = address_of(context, student.id).await?;
        let courses = courses_of(context, student.id).await?;
        details.push(StudentDetails {
            student,
            address,
            courses,
        });
    }
    Ok(details)
}

/// Student/course pairs, one row per enrollment and one empty row for each
/// student without enrollments
pub async fn student_courses(context: &StoreContext) -> Result<Vec<StudentCourse>, StoreError> {
    let courses: HashMap<EntityId, String> = context
        .query::<Course>()
        .to_list()
        .await?
        .into_iter()
        .map(|course| (course.id, course.name))
        .collect();
    let enrollments = context
        .query::<Enrollment>()
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await?;
    let students = context
        .query::<Student>()
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await?;

    let mut rows = Vec::new();
    for student in students {
        let before = rows.len();
        for enrollment in enrollments.iter().filter(|e| e.student_id == student.id) {
            rows.push(StudentCourse {
                student: student.name.clone(),
                course: courses.get(&enrollment.course_id).cloned(),
            });
        }
        if rows.len() == before {
            rows.push(StudentCourse {
                student: student.name.clone(),
                course: None,
            });
        }
    }

    debug_log!("student_courses produced {} rows", rows.len());
    Ok(rows)
}

/// Number of visible students enrolled in each course
pub async fn course_enrollment_counts(context: &StoreContext) -> Result<Vec<CourseEnrollment>, StoreError> {
    let visible: Vec<_> = context
        .query::<Student>()
        .to_list()
        .await?
        .iter()
        .map(|student| json!(student.id))
        .collect();
    let courses = context
        .query::<Course>()
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await?;

    let mut counts = Vec::with_capacity(courses.len());
    for course in courses {
        let students = context
            .query::<Enrollment>()
            .filter(QueryFilter::eq("course_id", json!(course.id)))
            .filter(QueryFilter::in_values("student_id", visible.clone()))
            .count()
            .await?;
        counts.push(CourseEnrollment {
            name: course.name,
            students,
        });
    }
    Ok(counts)
}

/// Students whose name matches a LIKE pattern, with the minutes elapsed
/// since their creation according to the context clock
pub async fn students_named_like(context: &StoreContext, pattern: &str) -> Result<Vec<StudentAge>, StoreError> {
    let now = context.clock().now();
    let students = context
        .query::<Student>()
        .filter(QueryFilter::like("name", pattern))
        .order_by("id", SortOrder::Asc)
        .to_list()
        .await?;

    Ok(students
        .into_iter()
        .map(|student| StudentAge {
            id: student.id,
            created_minutes_ago: (now - student.created_at).num_minutes(),
            name: student.name,
        })
        .collect())
}

/// Hand-written lookup of a student by key, `$1` being the key
pub const STUDENT_BY_ID_SQL: &str = "SELECT * FROM students WHERE id = $1";

/// A student by key through raw SQL; removed students stay hidden
pub fn student_by_id_sql(context: &StoreContext, id: EntityId) -> RawQuery<'_, Student> {
    context
        .query::<Student>()
        .from_sql(STUDENT_BY_ID_SQL, [json!(id)])
}
