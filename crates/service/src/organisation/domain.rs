use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: i64,
    pub name: String,
}

impl Organisation {
    /// Identifier of the workspace provisioned for this organisation.
    pub fn project_name(&self) -> String {
        format!("{}-{}", self.name, self.id).to_lowercase()
    }

    pub fn project_description(&self) -> String {
        format!("Workspace for {} (organisation {})", self.name, self.id)
    }
}

/// What the workspace API returned for a created project space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectHandle {
    pub id: i64,
    pub identifier: String,
}

impl From<models::organisation::Model> for Organisation {
    fn from(m: models::organisation::Model) -> Self {
        Organisation { id: m.id, name: m.name }
    }
}
