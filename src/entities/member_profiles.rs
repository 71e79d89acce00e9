use sea_orm::entity::prelude::*;

/// Census record for a member. One per user; everything beyond the name and
/// email is optional and filled in over time by the member or an admin.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "member_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub user_id: i32,

    pub email_address: String,

    pub first_name: String,

    pub surname: String,

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

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
