//! University sample model
//!
//! Students (soft-deletable and time-tracked) with an address, notes and
//! course enrollments, plus the queries and unit of work built over them.

pub mod entities;
pub mod model;
pub mod queries;
pub mod unit_of_work;

pub use entities::{
    Course, Enrollment, Note, Student, StudentAddress, StudentCourse, STUDENT_NAME_MAX_LEN,
};
pub use model::{model, StudentNameRule};
pub use queries::{CourseEnrollment, Seeded, StudentAge, StudentDetails, STUDENT_BY_ID_SQL};
pub use unit_of_work::UniversityUnitOfWork;
