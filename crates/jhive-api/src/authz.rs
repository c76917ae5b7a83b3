//! Authorization primitives: role allow-lists and ownership checks.

use jhive_models::{UserId, UserRole};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};

/// Requester's role must be in the allow-list.
pub fn require_role(user: &AuthUser, allowed: &[UserRole]) -> ApiResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Forbidden: insufficient role"))
    }
}

/// Requester's role must be in the allow-list, OR the requester must be the
/// owner of the addressed resource. Callers fetch the resource first, so a
/// missing resource is already a 404 by this point.
pub fn require_role_or_owner(
    user: &AuthUser,
    allowed: &[UserRole],
    owner: &UserId,
) -> ApiResult<()> {
    if allowed.contains(&user.role) || user.id == *owner {
        Ok(())
    } else {
        Err(ApiError::forbidden("Forbidden: you are not the owner"))
    }
}

/// Whether the requester is an admin.
pub fn is_admin(user: &AuthUser) -> bool {
    user.role == UserRole::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            id: UserId::from_string("u1"),
            role,
            email: "u1@example.com".to_string(),
            email_verified: true,
        }
    }

    #[test]
    fn role_allow_list() {
        let employer = user(UserRole::Employer);
        assert!(require_role(&employer, &[UserRole::Employer, UserRole::Admin]).is_ok());
        assert!(require_role(&employer, &[UserRole::Admin]).is_err());
        assert!(require_role(&employer, &[UserRole::Jobseeker]).is_err());
    }

    #[test]
    fn owner_passes_without_role() {
        let jobseeker = user(UserRole::Jobseeker);
        let own = UserId::from_string("u1");
        let other = UserId::from_string("u2");

        assert!(require_role_or_owner(&jobseeker, &[UserRole::Admin], &own).is_ok());
        assert!(require_role_or_owner(&jobseeker, &[UserRole::Admin], &other).is_err());
    }

    #[test]
    fn admin_passes_without_ownership() {
        let admin = user(UserRole::Admin);
        let other = UserId::from_string("u2");
        assert!(require_role_or_owner(&admin, &[UserRole::Admin], &other).is_ok());
    }
}
