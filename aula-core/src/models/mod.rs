pub mod chat;
pub mod course;

pub use chat::{truncate_window, ChatMessage, ChatRole};
pub use course::{embedding_text, Course, CourseMatch, NewCourse};
