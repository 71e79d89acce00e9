use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Bootstrap admin account, overridable via ADMIN_EMAIL / ADMIN_PASSWORD.
const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "password123";

fn hash_admin_password(password: &str) -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash admin password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let email =
            std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
        let password =
            std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string());

        let now = chrono::Utc::now().to_rfc3339();
        let password_hash = hash_admin_password(&password);

        let insert_user = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                crate::entities::users::Column::Email,
                crate::entities::users::Column::PasswordHash,
                crate::entities::users::Column::CreatedAt,
                crate::entities::users::Column::UpdatedAt,
            ])
            .values_panic([
                email.clone().into(),
                password_hash.into(),
                now.clone().into(),
                now.clone().into(),
            ])
            .to_owned();

        manager.exec_stmt(insert_user).await?;

        // The seed runs on a fresh database, so the admin gets id 1.
        let insert_role = sea_orm_migration::sea_query::Query::insert()
            .into_table(UserRoles)
            .columns([
                crate::entities::user_roles::Column::UserId,
                crate::entities::user_roles::Column::Role,
            ])
            .values_panic([1.into(), "admin".into()])
            .to_owned();

        manager.exec_stmt(insert_role).await?;

        let insert_profile = sea_orm_migration::sea_query::Query::insert()
            .into_table(MemberProfiles)
            .columns([
                crate::entities::member_profiles::Column::UserId,
                crate::entities::member_profiles::Column::EmailAddress,
                crate::entities::member_profiles::Column::FirstName,
                crate::entities::member_profiles::Column::Surname,
                crate::entities::member_profiles::Column::CreatedAt,
                crate::entities::member_profiles::Column::UpdatedAt,
            ])
            .values_panic([
                1.into(),
                email.into(),
                "Admin".into(),
                "User".into(),
                now.clone().into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert_profile).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let email =
            std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());

        let delete = sea_orm_migration::sea_query::Query::delete()
            .from_table(Users)
            .and_where(
                sea_orm_migration::sea_query::Expr::col(crate::entities::users::Column::Email)
                    .eq(email),
            )
            .to_owned();

        manager.exec_stmt(delete).await?;

        Ok(())
    }
}
