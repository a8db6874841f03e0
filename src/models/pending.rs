use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionRecord;

/// A session write buffered locally until the remote store accepts it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpload {
    pub id: Uuid,
    #[serde(rename = "groupID")]
    pub group_id: String,
    pub user_name: String,
    pub session_data: SessionRecord,
    pub timestamp: DateTime<Utc>,
}

impl PendingUpload {
    pub fn new(group_id: &str, user_name: &str, session: SessionRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id: group_id.to_string(),
            user_name: user_name.to_string(),
            session_data: session,
            timestamp: Utc::now(),
        }
    }
}
