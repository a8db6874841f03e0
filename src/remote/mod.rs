pub mod gateway;
pub mod memory;
pub mod records;
pub mod route;
pub mod store;

pub use gateway::{RemoteGateway, SessionUploader};
pub use memory::MemoryRecordStore;
pub use route::{resolve_route, DatabaseScope, Route, ZoneId};
pub use store::{FieldValue, Predicate, Query, Record, RecordId, RecordStore, SortDescriptor};
