use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AdminRegisterRequest, LoginRequest, RegisterRequest, ResetPasswordRequest},
        jwt::JwtKeys,
        password::{hash_password_async, verify_password_async},
        repo::UserStore,
        repo_types::{NewUser, Role, User},
    },
    db::StoreError,
    error::AppError,
};

/// A freshly minted bearer token and the account it belongs to.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Registration, login and credential lifecycle over a [`UserStore`].
///
/// Holds no per-request state; every call stands alone.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: Arc<JwtKeys>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: Arc<JwtKeys>) -> Self {
        Self { users, keys }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<Session, AppError> {
        let name = req.name.trim();
        let phone = req.phone.trim();
        let national_id = req.national_id.trim();
        if name.is_empty() || phone.is_empty() || req.password.is_empty() || national_id.is_empty()
        {
            warn!("register with missing fields");
            return Err(AppError::Validation("All fields are required".into()));
        }

        if self
            .users
            .find_by_phone_and_national_id(phone, national_id)
            .await?
            .is_some()
        {
            warn!(phone = %phone, "user already registered");
            return Err(AppError::Conflict("User already exists".into()));
        }

        self.create_and_sign(NewUser {
            name: name.to_string(),
            phone: phone.to_string(),
            password_hash: hash_password_async(req.password.clone()).await?,
            role: Role::User,
            national_id: Some(national_id.to_string()),
        })
        .await
    }

    pub async fn admin_register(&self, req: AdminRegisterRequest) -> Result<Session, AppError> {
        let name = req.name.trim();
        let phone = req.phone.trim();
        if name.is_empty() || phone.is_empty() || req.password.is_empty() {
            warn!("admin register with missing fields");
            return Err(AppError::Validation("All fields are required".into()));
        }

        if self.users.find_by_phone(phone).await?.is_some() {
            warn!(phone = %phone, "admin already registered");
            return Err(AppError::Conflict("User already exists".into()));
        }

        self.create_and_sign(NewUser {
            name: name.to_string(),
            phone: phone.to_string(),
            password_hash: hash_password_async(req.password.clone()).await?,
            role: Role::Admin,
            national_id: None,
        })
        .await
    }

    async fn create_and_sign(&self, new_user: NewUser) -> Result<Session, AppError> {
        let user = match self.users.create(new_user).await {
            Ok(u) => u,
            Err(StoreError::Duplicate) => {
                warn!("phone taken between check and insert");
                return Err(AppError::Conflict("User already exists".into()));
            }
            Err(e) => return Err(e.into()),
        };
        let token = self.keys.issue(user.id, user.role)?;
        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(Session { user, token })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<Session, AppError> {
        let phone = req.phone.trim();
        let user = self.users.find_by_phone(phone).await?.ok_or_else(|| {
            warn!(phone = %phone, "login unknown phone");
            AppError::NotFound("User not found".into())
        })?;

        if !verify_password_async(req.password.clone(), user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::Unauthorized("Incorrect password".into()));
        }

        let token = self.keys.issue(user.id, user.role)?;
        info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(Session { user, token })
    }

    /// Replaces the password of the account owning `phone`.
    ///
    /// The caller's identity is not checked: anyone who knows a phone number
    /// can reset its password.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AppError> {
        let phone = req.phone.trim();
        let user = self.users.find_by_phone(phone).await?.ok_or_else(|| {
            warn!(phone = %phone, "reset for unknown phone");
            AppError::NotFound("User not found".into())
        })?;

        if req.new_password.is_empty() {
            return Err(AppError::Validation("New password is required".into()));
        }

        let hash = hash_password_async(req.new_password.clone()).await?;
        if !self.users.update_password_hash(user.id, &hash).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        warn!(user_id = %user.id, "password reset without re-authentication");
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn list_employees(&self) -> Result<Vec<User>, AppError> {
        Ok(self.users.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::MemoryUserStore, config::JwtConfig};

    fn make_keys() -> Arc<JwtKeys> {
        Arc::new(JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        }))
    }

    fn service() -> (AuthService, Arc<JwtKeys>) {
        let keys = make_keys();
        (
            AuthService::new(Arc::new(MemoryUserStore::new()), keys.clone()),
            keys,
        )
    }

    fn asha() -> RegisterRequest {
        RegisterRequest {
            name: "Asha".into(),
            phone: "9999999999".into(),
            password: "Secret123".into(),
            national_id: "ABCD1234".into(),
        }
    }

    fn admin() -> AdminRegisterRequest {
        AdminRegisterRequest {
            name: "Admin".into(),
            phone: "8888888888".into(),
            password: "Pwd1234".into(),
        }
    }

    fn login(phone: &str, password: &str) -> LoginRequest {
        LoginRequest {
            phone: phone.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_as_user() {
        let (svc, keys) = service();

        let session = svc.register(asha()).await.expect("register");
        assert_eq!(session.user.role, Role::User);
        assert_ne!(session.user.password_hash, "Secret123");

        let session = svc.login(login("9999999999", "Secret123")).await.expect("login");
        let claims = keys.verify(&session.token).expect("token verifies");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.sub, session.user.id);

        let err = svc.login(login("9999999999", "wrong")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn second_register_with_same_phone_conflicts() {
        let (svc, _) = service();
        svc.register(asha()).await.expect("first register");

        let err = svc.register(asha()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Different national ID passes the pre-check but the phone is still taken.
        let err = svc
            .register(RegisterRequest {
                national_id: "ZZZZ0000".into(),
                ..asha()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_requires_every_field() {
        let (svc, _) = service();
        for req in [
            RegisterRequest { name: "  ".into(), ..asha() },
            RegisterRequest { phone: String::new(), ..asha() },
            RegisterRequest { password: String::new(), ..asha() },
            RegisterRequest { national_id: String::new(), ..asha() },
        ] {
            let err = svc.register(req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn admin_register_needs_no_national_id() {
        let (svc, keys) = service();
        let session = svc.admin_register(admin()).await.expect("admin register");
        assert_eq!(session.user.role, Role::Admin);
        assert!(session.user.national_id.is_none());
        assert_eq!(keys.verify(&session.token).unwrap().role, Role::Admin);

        let err = svc.admin_register(admin()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = svc
            .admin_register(AdminRegisterRequest { password: String::new(), ..admin() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn login_unknown_phone_is_not_found() {
        let (svc, _) = service();
        let err = svc.login(login("0000000000", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reset_password_replaces_hash() {
        let (svc, _) = service();
        svc.register(asha()).await.unwrap();

        svc.reset_password(ResetPasswordRequest {
            phone: "9999999999".into(),
            new_password: "N3wSecret".into(),
        })
        .await
        .expect("reset");

        assert!(svc.login(login("9999999999", "N3wSecret")).await.is_ok());
        let err = svc.login(login("9999999999", "Secret123")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reset_password_unknown_phone_is_not_found() {
        let (svc, _) = service();
        let err = svc
            .reset_password(ResetPasswordRequest {
                phone: "123".into(),
                new_password: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn profile_of_admin_has_no_password_hash() {
        let (svc, keys) = service();
        let session = svc.admin_register(admin()).await.unwrap();
        let claims = keys.verify(&session.token).unwrap();

        let user = svc.get_profile(claims.sub).await.expect("profile");
        assert_eq!(user.role, Role::Admin);

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "ADMIN");
    }

    #[tokio::test]
    async fn profile_of_missing_user_is_not_found() {
        let (svc, _) = service();
        let err = svc.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_employees_returns_every_account() {
        let (svc, _) = service();
        svc.register(asha()).await.unwrap();
        svc.admin_register(admin()).await.unwrap();
        assert_eq!(svc.list_employees().await.unwrap().len(), 2);
    }
}
