use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub organisation_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<models::organisation_user::Model> for Membership {
    fn from(m: models::organisation_user::Model) -> Self {
        Membership {
            id: m.id,
            user_id: m.user_id,
            organisation_id: m.organisation_id,
            is_active: m.is_active,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}
