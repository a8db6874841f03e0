pub mod group;
pub mod pending;
pub mod usage;

pub use group::{CreatedGroup, GroupInfo, MemberRecord};
pub use pending::PendingUpload;
pub use usage::{window_start, AppUsage, ScopedSummary, SessionRecord, TaskKind, TaskUsageSummary};
