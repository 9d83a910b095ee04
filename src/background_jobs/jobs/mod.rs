//! Built-in task implementations.

pub mod export_posts;

pub use export_posts::{ExportPostsTask, EXPORT_POSTS_TASK};
