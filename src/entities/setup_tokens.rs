use sea_orm::entity::prelude::*;

/// One-time password-setup credential. Only the Argon2id hash of the secret
/// is stored; the plaintext travels to the member by email and nowhere else.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "setup_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    pub token_hash: String,

    /// Absolute expiry, so verification needs no issuance-time context.
    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
