pub mod groups;
pub mod students;
