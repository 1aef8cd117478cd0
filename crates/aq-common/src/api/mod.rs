pub mod queue_status;

pub use queue_status::{
    BulkEnqueueResponse, DailyStats, PendingItem, QueueStatusResponse, RejectedUrl,
};
