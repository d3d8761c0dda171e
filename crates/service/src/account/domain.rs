use serde::{Deserialize, Serialize};

/// Domain user (business view).
///
/// Values are replaced, not mutated: each `with_*` step returns a new user,
/// and the final value is persisted once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub organisation_id: Option<i64>,
}

impl User {
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self }
    }

    pub fn with_organisation(self, organisation_id: i64) -> Self {
        Self { organisation_id: Some(organisation_id), ..self }
    }
}

/// Creation input; the id is assigned by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl From<models::user::Model> for User {
    fn from(m: models::user::Model) -> Self {
        User { id: m.id, name: m.name, email: m.email, password_hash: m.password_hash, organisation_id: m.organisation_id }
    }
}
