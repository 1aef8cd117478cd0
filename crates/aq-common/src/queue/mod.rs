pub mod application_queue;
pub mod dispatcher;
pub mod rate_limiter;
pub mod retry;

pub use application_queue::{
    ApplicationOutcome, ApplicationQueue, ApplicationRecord, QueueError, QueueItem, QueueStatus,
};
pub use dispatcher::{Dispatcher, SharedQueue};
pub use rate_limiter::{DailyRateLimiter, Reservation};
pub use retry::RetryScheduler;
