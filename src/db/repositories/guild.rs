use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::entities::{guilds, prelude::*, user_guilds};

pub struct GuildRepository {
    conn: DatabaseConnection,
}

impl GuildRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<guilds::Model>> {
        Guilds::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query guild")
    }

    /// Alphabetical, with member counts for display.
    pub async fn list_with_member_counts(&self) -> Result<Vec<(guilds::Model, i64)>> {
        let guilds = Guilds::find()
            .order_by_asc(guilds::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list guilds")?;

        let links = UserGuilds::find()
            .all(&self.conn)
            .await
            .context("Failed to list guild memberships")?;

        let mut counts: HashMap<i32, i64> = HashMap::new();
        for link in links {
            *counts.entry(link.guild_id).or_insert(0) += 1;
        }

        Ok(guilds
            .into_iter()
            .map(|g| {
                let count = counts.get(&g.id).copied().unwrap_or(0);
                (g, count)
            })
            .collect())
    }

    /// Unique-name violations bubble up as `DbErr` for the caller to map to
    /// a conflict.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<guilds::Model, DbErr> {
        let active = guilds::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.map(str::to_string)),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active.insert(&self.conn).await
    }

    /// Returns `Ok(None)` when the guild does not exist.
    pub async fn update(
        &self,
        id: i32,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<guilds::Model>, DbErr> {
        let Some(guild) = Guilds::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: guilds::ActiveModel = guild.into();
        if let Some(name) = name {
            active.name = Set(name.to_string());
        }
        if let Some(description) = description {
            active.description = Set(Some(description.to_string()));
        }

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    /// Deletes the guild and its membership links. Returns false when the
    /// guild does not exist.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        if Guilds::find_by_id(id).one(&self.conn).await?.is_none() {
            return Ok(false);
        }

        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    UserGuilds::delete_many()
                        .filter(user_guilds::Column::GuildId.eq(id))
                        .exec(txn)
                        .await?;

                    Guilds::delete_by_id(id).exec(txn).await?;

                    Ok(())
                })
            })
            .await
            .context("Failed to delete guild")?;

        Ok(true)
    }

    /// The guild a member belongs to, if any (one guild per member).
    pub async fn guild_for_user(&self, user_id: i32) -> Result<Option<guilds::Model>> {
        let link = UserGuilds::find()
            .filter(user_guilds::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query guild membership")?;

        let Some(link) = link else {
            return Ok(None);
        };

        Guilds::find_by_id(link.guild_id)
            .one(&self.conn)
            .await
            .context("Failed to query guild")
    }

    /// Guild names for the admin list view, keyed by user id.
    pub async fn guild_names_by_user_ids(&self, user_ids: &[i32]) -> Result<HashMap<i32, String>> {
        let links = UserGuilds::find()
            .filter(user_guilds::Column::UserId.is_in(user_ids.to_vec()))
            .all(&self.conn)
            .await
            .context("Failed to batch-query guild memberships")?;

        if links.is_empty() {
            return Ok(HashMap::new());
        }

        let guild_ids: Vec<i32> = links.iter().map(|l| l.guild_id).collect();
        let guilds = Guilds::find()
            .filter(guilds::Column::Id.is_in(guild_ids))
            .all(&self.conn)
            .await
            .context("Failed to batch-query guilds")?;

        let names: HashMap<i32, String> = guilds.into_iter().map(|g| (g.id, g.name)).collect();

        Ok(links
            .into_iter()
            .filter_map(|l| names.get(&l.guild_id).map(|n| (l.user_id, n.clone())))
            .collect())
    }
}
