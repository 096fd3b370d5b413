pub mod gradebook_service;
pub mod resolver;
pub mod selection;
