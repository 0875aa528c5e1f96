pub mod subscription;
pub mod task;
pub mod user;

pub use subscription::{NotificationPreferences, NotificationSubscription, Preference, SubscribeRequest};
pub use task::{CompletionFilter, Task, TaskInput, TaskPriority, TaskQuery, TaskUpdate};
pub use user::{ProfileUpdate, User, UserRecord};
