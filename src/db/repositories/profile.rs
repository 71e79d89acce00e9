use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set,
};
use std::collections::HashMap;

use crate::entities::{member_profiles, prelude::*};

/// Profile fields an admin or member can write. `None` leaves the stored
/// value untouched on update and stays empty on create.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub first_name: Option<String>,
    pub surname: Option<String>,
    pub title: Option<String>,
    pub middle_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub place_of_baptism: Option<String>,
    pub baptism_number: Option<String>,
    pub type_of_marriage: Option<String>,
    pub place_of_marriage: Option<String>,
    pub marriage_number: Option<String>,
    pub married_to: Option<String>,
    pub section_name: Option<String>,
    pub church_support_card: Option<String>,
    pub occupation: Option<String>,
    pub skills: Option<String>,
    pub profession: Option<String>,
    pub notes: Option<String>,
}

pub struct ProfileRepository {
    conn: DatabaseConnection,
}

impl ProfileRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_user_id(&self, user_id: i32) -> Result<Option<member_profiles::Model>> {
        MemberProfiles::find()
            .filter(member_profiles::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query member profile")
    }

    /// Display names for the admin list view, keyed by user id.
    pub async fn names_by_user_ids(&self, user_ids: &[i32]) -> Result<HashMap<i32, String>> {
        let rows = MemberProfiles::find()
            .filter(member_profiles::Column::UserId.is_in(user_ids.to_vec()))
            .all(&self.conn)
            .await
            .context("Failed to batch-query member profiles")?;

        Ok(rows
            .into_iter()
            .map(|p| {
                let name = format!("{} {}", p.first_name, p.surname).trim().to_string();
                (p.user_id, name)
            })
            .collect())
    }
}

/// Create-or-update the profile row for a user. Existing values survive
/// unless the input carries a replacement.
pub async fn upsert<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    email: &str,
    input: &ProfileInput,
) -> Result<member_profiles::Model, DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    let existing = MemberProfiles::find()
        .filter(member_profiles::Column::UserId.eq(user_id))
        .one(conn)
        .await?;

    if let Some(profile) = existing {
        let mut active: member_profiles::ActiveModel = profile.into();

        active.email_address = Set(email.to_string());
        if let Some(v) = &input.first_name {
            active.first_name = Set(v.clone());
        }
        if let Some(v) = &input.surname {
            active.surname = Set(v.clone());
        }
        if let Some(v) = &input.title {
            active.title = Set(Some(v.clone()));
        }
        if let Some(v) = &input.middle_name {
            active.middle_name = Set(Some(v.clone()));
        }
        if let Some(v) = &input.gender {
            active.gender = Set(Some(v.clone()));
        }
        if let Some(v) = &input.date_of_birth {
            active.date_of_birth = Set(Some(v.clone()));
        }
        if let Some(v) = &input.marital_status {
            active.marital_status = Set(Some(v.clone()));
        }
        if let Some(v) = &input.address {
            active.address = Set(Some(v.clone()));
        }
        if let Some(v) = &input.phone_number {
            active.phone_number = Set(Some(v.clone()));
        }
        if let Some(v) = &input.place_of_baptism {
            active.place_of_baptism = Set(Some(v.clone()));
        }
        if let Some(v) = &input.baptism_number {
            active.baptism_number = Set(Some(v.clone()));
        }
        if let Some(v) = &input.type_of_marriage {
            active.type_of_marriage = Set(Some(v.clone()));
        }
        if let Some(v) = &input.place_of_marriage {
            active.place_of_marriage = Set(Some(v.clone()));
        }
        if let Some(v) = &input.marriage_number {
            active.marriage_number = Set(Some(v.clone()));
        }
        if let Some(v) = &input.married_to {
            active.married_to = Set(Some(v.clone()));
        }
        if let Some(v) = &input.section_name {
            active.section_name = Set(Some(v.clone()));
        }
        if let Some(v) = &input.church_support_card {
            active.church_support_card = Set(Some(v.clone()));
        }
        if let Some(v) = &input.occupation {
            active.occupation = Set(Some(v.clone()));
        }
        if let Some(v) = &input.skills {
            active.skills = Set(Some(v.clone()));
        }
        if let Some(v) = &input.profession {
            active.profession = Set(Some(v.clone()));
        }
        if let Some(v) = &input.notes {
            active.notes = Set(Some(v.clone()));
        }
        active.updated_at = Set(now);

        return active.update(conn).await;
    }

    let active = member_profiles::ActiveModel {
        user_id: Set(user_id),
        email_address: Set(email.to_string()),
        first_name: Set(input.first_name.clone().unwrap_or_default()),
        surname: Set(input.surname.clone().unwrap_or_default()),
        title: Set(input.title.clone()),
        middle_name: Set(input.middle_name.clone()),
        gender: Set(input.gender.clone()),
        date_of_birth: Set(input.date_of_birth.clone()),
        marital_status: Set(input.marital_status.clone()),
        address: Set(input.address.clone()),
        phone_number: Set(input.phone_number.clone()),
        place_of_baptism: Set(input.place_of_baptism.clone()),
        baptism_number: Set(input.baptism_number.clone()),
        type_of_marriage: Set(input.type_of_marriage.clone()),
        place_of_marriage: Set(input.place_of_marriage.clone()),
        marriage_number: Set(input.marriage_number.clone()),
        married_to: Set(input.married_to.clone()),
        section_name: Set(input.section_name.clone()),
        church_support_card: Set(input.church_support_card.clone()),
        occupation: Set(input.occupation.clone()),
        skills: Set(input.skills.clone()),
        profession: Set(input.profession.clone()),
        notes: Set(input.notes.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    active.insert(conn).await
}
