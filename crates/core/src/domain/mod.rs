pub mod gradebook;
pub mod sheets;
