use chrono::Utc;
use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::organisation;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub organisation_id: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Organisation,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Organisation => Entity::belongs_to(organisation::Entity)
                .from(Column::OrganisationId)
                .to(organisation::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    if !email.contains('@') { return Err(ModelError::Validation("invalid email".into())); }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() { return Err(ModelError::Validation("name required".into())); }
    Ok(())
}

pub async fn create<C: ConnectionTrait>(db: &C, name: &str, email: &str, password_hash: &str) -> Result<Model, ModelError> {
    validate_email(email)?;
    validate_name(name)?;
    if password_hash.is_empty() { return Err(ModelError::Validation("password hash required".into())); }
    let now = Utc::now().into();
    let am = ActiveModel {
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash.to_string()),
        organisation_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    am.insert(db).await.map_err(ModelError::from_db)
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<Model>, ModelError> {
    Entity::find()
        .filter(Column::Email.eq(email.to_string()))
        .one(db)
        .await
        .map_err(ModelError::from_db)
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Model>, ModelError> {
    Entity::find_by_id(id).one(db).await.map_err(ModelError::from_db)
}

/// Overwrite name, password hash and organisation of the row holding `email`.
/// Returns `Ok(None)` when no such row exists.
pub async fn overwrite_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
    name: &str,
    password_hash: &str,
    organisation_id: Option<i64>,
) -> Result<Option<Model>, ModelError> {
    validate_name(name)?;
    let Some(found) = find_by_email(db, email).await? else { return Ok(None) };
    let mut am: ActiveModel = found.into();
    am.name = Set(name.to_string());
    am.password_hash = Set(password_hash.to_string());
    am.organisation_id = Set(organisation_id);
    am.updated_at = Set(Utc::now().into());
    am.update(db).await.map(Some).map_err(ModelError::from_db)
}
