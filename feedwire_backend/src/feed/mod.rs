pub mod assembler;
pub mod cursor;
pub mod privacy;
pub mod service;
pub mod timeline;
pub mod waiter;

pub use assembler::{assemble, AggregateView};
pub use cursor::{Cursor, Direction, Page, StreamKey, START_OF_STREAM};
pub use privacy::{Viewer, ANONYMOUS_VISITOR_ID};
pub use service::{FeedService, PostDraft};
pub use timeline::{count_posts_in_timeline, merge_streams, resolve_timeline};
pub use waiter::{UpdateNotifier, UpdateWaiter, WaitOutcome, WaitState};
