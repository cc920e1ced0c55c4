pub mod page;
pub mod post;

pub use page::{FeedPage, PageMeta};
pub use post::{Media, Post, PostId, Term};
