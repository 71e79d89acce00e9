pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, AuthenticatedUser, OtpOutcome, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;

pub mod provision_service;
pub mod provision_service_impl;
pub use provision_service::{
    CreatedMember, ImportSummary, MemberRecord, ProvisionError, ProvisionService, RedeemedUser,
};
pub use provision_service_impl::SeaOrmProvisionService;
