pub mod grading;
pub mod record;
pub mod schema;
