use std::str::FromStr;
use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{Duration, Local, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::error::AppError;
use crate::models::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UserRecord, UserSummary,
};
use crate::sheets::{SheetRow, SheetStore};

pub const USERS_SHEET: &str = "users";
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub algorithm: Algorithm,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, String> {
        let algorithm = Algorithm::from_str(&settings.jwt_algorithm)
            .map_err(|_| format!("unknown JWT_ALGORITHM {}", settings.jwt_algorithm))?;
        // Only shared-secret signing is configurable.
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(format!("JWT_ALGORITHM {} needs a key pair; use HS256/384/512", settings.jwt_algorithm));
        }
        Ok(Self {
            jwt_secret: settings.jwt_secret.clone(),
            algorithm,
            jwt_expiration_hours: settings.jwt_expiry_hours,
            bcrypt_cost: settings.bcrypt_cost,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn cell(row: &SheetRow, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl UserRecord {
    fn from_row(row: &SheetRow) -> Self {
        Self {
            name: cell(row, "Name"),
            email: cell(row, "Email"),
            password_hash: cell(row, "Password_Hash"),
            created_at: cell(row, "Created_At"),
        }
    }

    fn into_row(self) -> SheetRow {
        let mut row = SheetRow::new();
        row.insert("Name".into(), self.name.into());
        row.insert("Email".into(), self.email.into());
        row.insert("Password_Hash".into(), self.password_hash.into());
        row.insert("Created_At".into(), self.created_at.into());
        row
    }
}

/// Registration, login and bearer-token checks over the users sheet.
pub struct AuthService {
    config: AuthConfig,
    sheets: Arc<dyn SheetStore>,
}

impl AuthService {
    pub fn new(config: AuthConfig, sheets: Arc<dyn SheetStore>) -> Self {
        Self { config, sheets }
    }

    /// bcrypt runs on the blocking pool.
    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.config.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
    }

    /// Malformed hashes count as a mismatch.
    pub async fn verify_password(&self, password: &str, hashed: &str) -> Result<bool, AppError> {
        let (password, hashed) = (password.to_string(), hashed.to_string());
        tokio::task::spawn_blocking(move || verify(password, &hashed).unwrap_or(false))
            .await
            .map_err(|e| AppError::Internal(format!("password check task failed: {}", e)))
    }

    pub fn generate_token(&self, email: &str) -> Result<String, AppError> {
        let exp = Utc::now() + Duration::hours(self.config.jwt_expiration_hours);
        let claims = Claims { email: email.to_string(), exp: exp.timestamp() as usize };

        encode(
            &Header::new(self.config.algorithm),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )
        .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))
    }

    /// Returns the email the token was issued for.
    pub fn verify_token(&self, token: &str) -> Result<String, AppError> {
        let key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(self.config.algorithm);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::invalid_token()
        })?;
        if data.claims.email.is_empty() {
            return Err(AppError::invalid_token());
        }
        Ok(data.claims.email)
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let email = normalize_email(email);
        let rows = self.sheets.rows(USERS_SHEET, &[]).await?;
        Ok(rows
            .iter()
            .map(UserRecord::from_row)
            .find(|user| normalize_email(&user.email) == email))
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        let email = normalize_email(&req.email);
        if email.is_empty() || req.password.is_empty() {
            return Err(AppError::BadRequest("Email and Password are required".to_string()));
        }
        if self.find_user(&email).await?.is_some() {
            return Err(AppError::UserExists);
        }

        let record = UserRecord {
            name: req.name.clone(),
            email: email.clone(),
            password_hash: self.hash_password(&req.password).await?,
            created_at: Local::now().format(CREATED_AT_FORMAT).to_string(),
        };
        self.sheets.append(USERS_SHEET, record.into_row()).await?;
        tracing::info!("Registered user {}", email);

        Ok(RegisterResponse {
            message: "Registration successful".to_string(),
            user: UserSummary { name: req.name, email },
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&req.email);
        let user = match self.find_user(&email).await? {
            Some(user) if self.verify_password(&req.password, &user.password_hash).await? => user,
            _ => return Err(AppError::invalid_credentials()),
        };

        let token = self.generate_token(&email)?;
        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token,
            user: UserSummary { name: user.name, email },
        })
    }
}
