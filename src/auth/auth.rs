use actix_web::error::ErrorUnauthorized;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_access_token;
use crate::config::Config;
use crate::engine::approval::Actor;
use crate::error::{HrError, HrResult};
use crate::model::role::Role;
use crate::models::Claims;

/// The caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = Role::from_id(claims.role).ok_or("Invalid role")?;
        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(token) = bearer(req) else {
            return ready(Err(ErrorUnauthorized("Missing token")));
        };
        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(actix_web::error::ErrorInternalServerError(
                "Config missing",
            )));
        };

        let result = verify_access_token(token, &config.jwt_secret)
            .map_err(|_| ErrorUnauthorized("Invalid token"))
            .and_then(|claims| AuthUser::try_from(claims).map_err(ErrorUnauthorized));
        ready(result)
    }
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }

    pub fn require_admin(&self) -> HrResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(HrError::Forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> HrResult<()> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(HrError::Forbidden("HR/Admin only"))
        }
    }

    /// Employee profile of the caller, required for self-service endpoints.
    pub fn employee_id(&self) -> HrResult<u64> {
        self.employee_id
            .ok_or(HrError::Forbidden("No employee profile"))
    }

    /// HR and admin see everyone; anybody else only themselves.
    pub fn can_access_employee(&self, employee_id: u64) -> bool {
        self.role.is_hr_or_admin() || self.employee_id == Some(employee_id)
    }

    pub fn require_access_to(&self, employee_id: u64) -> HrResult<()> {
        if self.can_access_employee(employee_id) {
            Ok(())
        } else {
            Err(HrError::Forbidden("Not your record"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::testing::token;
    use crate::models::TokenType;
    use actix_web::test::TestRequest;

    fn config() -> Data<Config> {
        Data::new(Config::for_tests())
    }

    #[actix_web::test]
    async fn extracts_user_from_bearer_token() {
        let t = token(8, 5, Some(80), TokenType::Access, "test-secret");
        let (req, mut payload) = TestRequest::default()
            .app_data(config())
            .insert_header(("Authorization", format!("Bearer {t}")))
            .to_http_parts();

        let user = AuthUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(user.username, "user8");
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.employee_id().unwrap(), 80);
        assert!(user.require_hr_or_admin().is_err());
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let (req, mut payload) = TestRequest::default()
            .app_data(config())
            .to_http_parts();
        assert!(AuthUser::from_request(&req, &mut payload).await.is_err());
    }

    #[actix_web::test]
    async fn unknown_role_id_is_unauthorized() {
        let t = token(8, 9, None, TokenType::Access, "test-secret");
        let (req, mut payload) = TestRequest::default()
            .app_data(config())
            .insert_header(("Authorization", format!("Bearer {t}")))
            .to_http_parts();
        assert!(AuthUser::from_request(&req, &mut payload).await.is_err());
    }

    #[actix_web::test]
    async fn middleware_result_wins_over_header() {
        let (req, mut payload) = TestRequest::default().to_http_parts();
        req.extensions_mut().insert(AuthUser {
            user_id: 1,
            username: "hr".into(),
            role: Role::Hr,
            employee_id: None,
        });
        let user = AuthUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(user.role, Role::Hr);
        assert!(user.can_access_employee(99));
    }

    #[test]
    fn employees_only_reach_their_own_rows() {
        let user = AuthUser {
            user_id: 2,
            username: "e".into(),
            role: Role::Supervisor,
            employee_id: Some(20),
        };
        assert!(user.require_access_to(20).is_ok());
        assert!(matches!(user.require_access_to(21), Err(HrError::Forbidden(_))));
    }
}
