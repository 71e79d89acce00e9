pub use super::documents::Entity as Documents;
pub use super::guilds::Entity as Guilds;
pub use super::member_profiles::Entity as MemberProfiles;
pub use super::otp_codes::Entity as OtpCodes;
pub use super::setup_tokens::Entity as SetupTokens;
pub use super::user_guilds::Entity as UserGuilds;
pub use super::user_roles::Entity as UserRoles;
pub use super::users::Entity as Users;
