pub mod prelude;

pub mod documents;
pub mod guilds;
pub mod member_profiles;
pub mod otp_codes;
pub mod setup_tokens;
pub mod user_guilds;
pub mod user_roles;
pub mod users;
