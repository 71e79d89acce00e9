use crate::entities::prelude::*;
use crate::entities::user_roles;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserRoles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Guilds)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserGuilds)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(MemberProfiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Documents)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SetupTokens)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(OtpCodes)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // A user carries each role at most once.
        manager
            .create_index(
                Index::create()
                    .name("idx_user_roles_user_role")
                    .table(UserRoles)
                    .col(user_roles::Column::UserId)
                    .col(user_roles::Column::Role)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OtpCodes).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SetupTokens).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Documents).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MemberProfiles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserGuilds).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Guilds).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserRoles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
