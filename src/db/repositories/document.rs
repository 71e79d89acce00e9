use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

use crate::entities::{documents, prelude::*};

pub struct DocumentRepository {
    conn: DatabaseConnection,
}

impl DocumentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Documents visible to a member: parish-wide rows plus the member's
    /// guild rows, newest first. `page` is 1-based.
    pub async fn list_for_guild(
        &self,
        guild_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<documents::Model>, u64)> {
        let mut visibility = Condition::any().add(documents::Column::GuildId.is_null());
        if let Some(guild_id) = guild_id {
            visibility = visibility.add(documents::Column::GuildId.eq(guild_id));
        }

        let paginator = Documents::find()
            .filter(visibility)
            .order_by_desc(documents::Column::CreatedAt)
            .paginate(&self.conn, page_size);

        let total_pages = paginator.num_pages().await?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch documents page")?;

        Ok((items, total_pages))
    }

    pub async fn count_all(&self) -> Result<u64> {
        Documents::find()
            .count(&self.conn)
            .await
            .context("Failed to count documents")
    }
}
