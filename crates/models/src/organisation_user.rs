use chrono::Utc;
use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::{organisation, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organisation_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub organisation_id: i64,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    User,
    Organisation,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::User => Entity::belongs_to(user::Entity)
                .from(Column::UserId)
                .to(user::Column::Id)
                .into(),
            Relation::Organisation => Entity::belongs_to(organisation::Entity)
                .from(Column::OrganisationId)
                .to(organisation::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub async fn find_pair<C: ConnectionTrait>(db: &C, user_id: i64, organisation_id: i64) -> Result<Option<Model>, ModelError> {
    Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::OrganisationId.eq(organisation_id))
        .one(db)
        .await
        .map_err(ModelError::from_db)
}

/// Insert an active membership; a second insert for the same pair fails with
/// [`ModelError::Duplicate`] through `uniq_organisation_user_pair`.
pub async fn create<C: ConnectionTrait>(db: &C, user_id: i64, organisation_id: i64) -> Result<Model, ModelError> {
    let now = Utc::now().into();
    let am = ActiveModel {
        user_id: Set(user_id),
        organisation_id: Set(organisation_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    am.insert(db).await.map_err(ModelError::from_db)
}
