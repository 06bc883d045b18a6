use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::users::{
    AccountType, LoginRequest, NewUser, Referral, RegisterUser, Role, User, UserPatch,
};
use crate::repositories::{is_unique_violation, Repositories};
use crate::settings;

const SERVICE: &str = "User";
const MIN_PHONE_LEN: usize = 11;
const MIN_PASSWORD_LEN: usize = 6;
const REF_CODE_ATTEMPTS: usize = 10;
/// Quota granted to a new account and added to its referrer on sign-up.
const REFERRAL_JOB_QUOTA: i32 = 2;

pub enum UserRequest {
    Register {
        request: RegisterUser,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    Login {
        request: LoginRequest,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    GetUser {
        id: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    ListUsers {
        response: oneshot::Sender<Result<Vec<User>, ServiceError>>,
    },
    Downline {
        id: String,
        response: oneshot::Sender<Result<Vec<Referral>, ServiceError>>,
    },
    UpdateUser {
        id: String,
        patch: UserPatch,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    DeleteUser {
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

/// Maps a write error to `Conflict` when a unique column was hit, which
/// happens when a concurrent request took the phone after our check.
fn write_error(conflict: &str) -> impl Fn(anyhow::Error) -> ServiceError + '_ {
    move |e| {
        if is_unique_violation(&e) {
            log::debug!("Unique violation on user write: {}", e);
            ServiceError::Conflict(conflict.to_string())
        } else {
            ServiceError::repository(SERVICE)(e)
        }
    }
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repositories: Repositories,
}

impl UserRequestHandler {
    pub fn new(repositories: Repositories) -> Self {
        UserRequestHandler { repositories }
    }

    /// Creates the configured admin account unless its phone is already taken.
    pub async fn ensure_admin(&self, admin: &settings::Admin) -> Result<(), ServiceError> {
        let existing = self
            .repositories
            .users
            .get_user_by_phone(&admin.phone)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        if let Some(user) = existing {
            if !user.is_admin() {
                log::warn!(
                    "Configured admin phone {} belongs to non-admin user {}.",
                    admin.phone,
                    user.id
                );
            }
            return Ok(());
        }

        let user = self
            .repositories
            .users
            .insert_user(NewUser {
                full_name: admin.full_name.clone(),
                phone: admin.phone.clone(),
                email: admin.email.clone(),
                password_hash: hash_password(&admin.password)?,
                ref_code: admin.ref_code.clone(),
                upline_ref_code: None,
                role: Role::Admin,
                account_type: AccountType::Premium,
                referral_job_quota: 0,
            })
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        log::info!("Seeded admin account {}.", user.id);
        Ok(())
    }

    pub async fn register(&self, request: RegisterUser) -> Result<User, ServiceError> {
        let full_name = request.full_name.trim();
        let phone = request.phone.trim();
        let ref_code = request.ref_code.trim();

        if full_name.is_empty() {
            return Err(ServiceError::Validation("Full name is required.".to_string()));
        }
        if phone.len() < MIN_PHONE_LEN {
            return Err(ServiceError::Validation(format!(
                "Phone must have at least {} digits.",
                MIN_PHONE_LEN
            )));
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "Password must have at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }
        if ref_code.is_empty() {
            return Err(ServiceError::Validation("Referral code is required.".to_string()));
        }

        let users = &self.repositories.users;

        if users
            .get_user_by_phone(phone)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Phone {} is already registered.",
                phone
            )));
        }

        let referrer = users
            .get_user_by_ref_code(ref_code)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| ServiceError::Validation("Invalid referral code.".to_string()))?;

        let new_code = self.generate_ref_code().await?;
        let password_hash = hash_password(&request.password)?;

        let user = users
            .insert_user(NewUser {
                full_name: full_name.to_string(),
                phone: phone.to_string(),
                email: request.email.trim().to_string(),
                password_hash,
                ref_code: new_code,
                upline_ref_code: Some(referrer.ref_code.clone()),
                role: Role::User,
                account_type: AccountType::Free,
                referral_job_quota: REFERRAL_JOB_QUOTA,
            })
            .await
            .map_err(write_error("Phone is already registered."))?;

        users
            .increment_referral_quota(&referrer.id, REFERRAL_JOB_QUOTA)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        log::info!("Registered user {} referred by {}.", user.id, referrer.id);
        Ok(user)
    }

    async fn generate_ref_code(&self) -> Result<String, ServiceError> {
        for _ in 0..REF_CODE_ATTEMPTS {
            let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();

            let taken = self
                .repositories
                .users
                .get_user_by_ref_code(&code)
                .await
                .map_err(ServiceError::repository(SERVICE))?;
            if taken.is_none() {
                return Ok(code);
            }
        }

        Err(ServiceError::Internal(
            "Could not allocate a unique referral code.".to_string(),
        ))
    }

    pub async fn login(&self, request: LoginRequest) -> Result<User, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid phone or password.".to_string());

        let user = self
            .repositories
            .users
            .get_user_by_phone(request.phone.trim())
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash) {
            log::debug!("Rejected login for {}: wrong password.", user.id);
            return Err(invalid());
        }
        if user.is_blocked {
            return Err(ServiceError::Unauthorized("Account blocked".to_string()));
        }

        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        self.repositories
            .users
            .get_user_by_id(id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}.", id)))
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.repositories
            .users
            .list_users()
            .await
            .map_err(ServiceError::repository(SERVICE))
    }

    async fn downline(&self, id: &str) -> Result<Vec<Referral>, ServiceError> {
        let user = self.get_user(id).await?;

        let downline = self
            .repositories
            .users
            .list_downline(&user.ref_code)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        Ok(downline.into_iter().map(Referral::from).collect())
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, ServiceError> {
        let negative_balance = [patch.balance_free_in_cents, patch.balance_premium_in_cents]
            .iter()
            .flatten()
            .any(|balance| *balance < 0);
        if negative_balance {
            return Err(ServiceError::Validation(
                "Balances cannot be negative.".to_string(),
            ));
        }
        if patch.referral_job_quota.is_some_and(|quota| quota < 0) {
            return Err(ServiceError::Validation(
                "Referral quota cannot be negative.".to_string(),
            ));
        }

        if let Some(phone) = &patch.phone {
            let owner = self
                .repositories
                .users
                .get_user_by_phone(phone)
                .await
                .map_err(ServiceError::repository(SERVICE))?;
            if owner.is_some_and(|owner| owner.id != id) {
                return Err(ServiceError::Conflict(format!(
                    "Phone {} is already registered.",
                    phone
                )));
            }
        }

        let user = self
            .repositories
            .users
            .update_user(id, patch)
            .await
            .map_err(write_error("Phone is already registered."))?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}.", id)))?;

        log::info!("Updated user {}.", id);
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> Result<(), ServiceError> {
        let deleted = self
            .repositories
            .users
            .delete_user(id)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        if !deleted {
            return Err(ServiceError::NotFound(format!("User not found: {}.", id)));
        }

        log::info!("Deleted user {}.", id);
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("Could not hash password: {}", e)))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register { request, response } => {
                let result = self.register(request).await;
                let _ = response.send(result);
            }
            UserRequest::Login { request, response } => {
                let result = self.login(request).await;
                let _ = response.send(result);
            }
            UserRequest::GetUser { id, response } => {
                let result = self.get_user(&id).await;
                let _ = response.send(result);
            }
            UserRequest::ListUsers { response } => {
                let result = self.list_users().await;
                let _ = response.send(result);
            }
            UserRequest::Downline { id, response } => {
                let result = self.downline(&id).await;
                let _ = response.send(result);
            }
            UserRequest::UpdateUser {
                id,
                patch,
                response,
            } => {
                let result = self.update_user(&id, &patch).await;
                let _ = response.send(result);
            }
            UserRequest::DeleteUser { id, response } => {
                let result = self.delete_user(&id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
