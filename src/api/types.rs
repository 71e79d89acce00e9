use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Admin list view row. `status` is derived: a member with a password hash
/// is active, one without is still pending setup.
#[derive(Debug, Serialize)]
pub struct UserSummaryDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub guild: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct GuildDto {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub member_count: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentDto {
    pub id: i32,
    pub guild_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub created_at: String,
}

impl From<crate::entities::documents::Model> for DocumentDto {
    fn from(model: crate::entities::documents::Model) -> Self {
        Self {
            id: model.id,
            guild_id: model.guild_id,
            title: model.title,
            description: model.description,
            file_url: model.file_url,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListDto {
    pub documents: Vec<DocumentDto>,
    pub total_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummaryDto {
    pub guild_name: Option<String>,
    pub guild_status: String,
    pub document_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ProfileDto {
    pub user_id: i32,
    pub email: String,
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
    pub updated_at: String,
}

impl ProfileDto {
    /// The email on the user record wins over the census copy.
    #[must_use]
    pub fn from_profile(profile: crate::entities::member_profiles::Model, email: String) -> Self {
        Self {
            user_id: profile.user_id,
            email,
            first_name: profile.first_name,
            surname: profile.surname,
            title: profile.title,
            middle_name: profile.middle_name,
            gender: profile.gender,
            date_of_birth: profile.date_of_birth,
            marital_status: profile.marital_status,
            address: profile.address,
            phone_number: profile.phone_number,
            place_of_baptism: profile.place_of_baptism,
            baptism_number: profile.baptism_number,
            type_of_marriage: profile.type_of_marriage,
            place_of_marriage: profile.place_of_marriage,
            marriage_number: profile.marriage_number,
            married_to: profile.married_to,
            section_name: profile.section_name,
            church_support_card: profile.church_support_card,
            occupation: profile.occupation,
            skills: profile.skills,
            profession: profile.profession,
            notes: profile.notes,
            updated_at: profile.updated_at,
        }
    }
}
