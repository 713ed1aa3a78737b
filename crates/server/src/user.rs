//! Authenticated user of a request.

use api_types::user::UserView;
use axum::{Extension, Json};
use engine::users::{Column, Entity, Model};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

/// The user matching both credentials, if any.
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<Model>, DbErr> {
    Entity::find()
        .filter(Column::Username.eq(username))
        .filter(Column::Password.eq(password))
        .one(db)
        .await
}

pub async fn me(Extension(user): Extension<Model>) -> Json<UserView> {
    Json(UserView {
        username: user.username,
        base_currency: user.base_currency,
    })
}
