use std::sync::Arc;

use log::info;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;

use crate::error::{MarketError, MarketResult};
use crate::models::{canonical_tags, Coordinates, LoginDto, ProfileUpdate, RegisterDto, User};
use crate::store::{StoreError, UserStore};
use crate::utils::validation::{require_text, validate_dto, validate_email};

const PROFILE_FIELDS: [&str; 4] = ["name", "email", "location", "skills"];

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Registration, login and self-service profile edits.
pub struct AccountService {
    users: Arc<dyn UserStore>,
    bcrypt_cost: u32,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn duplicate_email(err: StoreError) -> MarketError {
    match err {
        StoreError::Duplicate(_) => MarketError::conflict("Email is already registered"),
        other => MarketError::Storage(other),
    }
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, bcrypt_cost: u32) -> Self {
        AccountService { users, bcrypt_cost }
    }

    pub async fn register(&self, dto: RegisterDto) -> MarketResult<User> {
        validate_dto(&dto)?;

        let email = normalize_email(&dto.email);
        let name = require_text(&dto.name, "Name is required")?;
        let location = dto.location.map(Coordinates::to_point).transpose()?.unwrap_or_default();

        let password_hash = bcrypt::hash(&dto.password, self.bcrypt_cost)
            .map_err(|e| MarketError::internal(format!("password hashing failed: {}", e)))?;

        let now = DateTime::now();
        let user = User {
            id: None,
            email,
            password_hash,
            name,
            role: dto.role,
            skills: canonical_tags(&dto.skills),
            location,
            rating: 0.0,
            total_reviews: 0,
            completed_tasks: 0,
            response_rate: 0.0,
            created_at: now,
            updated_at: now,
        };

        let user = self.users.insert_user(user).await.map_err(duplicate_email)?;
        info!("Registered {} {:?}", user.role.as_str(), user.id);
        Ok(user)
    }

    pub async fn login(&self, dto: LoginDto) -> MarketResult<User> {
        let user = self
            .users
            .find_user_by_email(&normalize_email(&dto.email))
            .await?
            .ok_or_else(|| MarketError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

        match bcrypt::verify(&dto.password, &user.password_hash) {
            Ok(true) => Ok(user),
            _ => Err(MarketError::Unauthorized(BAD_CREDENTIALS.to_string())),
        }
    }

    pub async fn profile(&self, id: ObjectId) -> MarketResult<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| MarketError::not_found("User not found"))
    }

    pub async fn update_profile(&self, id: ObjectId, body: &Value) -> MarketResult<User> {
        let update = parse_profile_update(body)?;

        self.users
            .update_profile(id, &update)
            .await
            .map_err(duplicate_email)?
            .ok_or_else(|| MarketError::not_found("User not found"))
    }
}

/// Whitelisted profile patch. Any key outside the four editable fields fails
/// the whole request.
pub fn parse_profile_update(body: &Value) -> MarketResult<ProfileUpdate> {
    let fields = body
        .as_object()
        .ok_or_else(|| MarketError::validation("Update body must be a JSON object"))?;

    if !fields.keys().all(|key| PROFILE_FIELDS.contains(&key.as_str())) {
        return Err(MarketError::validation("Invalid updates!"));
    }

    let mut update = ProfileUpdate::default();

    if let Some(name) = fields.get("name") {
        let name = name.as_str().ok_or_else(|| MarketError::validation("Name must be text"))?;
        update.name = Some(require_text(name, "Name is required")?);
    }

    if let Some(email) = fields.get("email") {
        let email = email
            .as_str()
            .map(normalize_email)
            .filter(|e| validate_email(e))
            .ok_or_else(|| MarketError::validation("Invalid email address"))?;
        update.email = Some(email);
    }

    if let Some(location) = fields.get("location") {
        let coordinates: Coordinates = serde_json::from_value(location.clone())
            .map_err(|_| MarketError::validation("Location needs latitude and longitude"))?;
        update.location = Some(coordinates.to_point()?);
    }

    if let Some(skills) = fields.get("skills") {
        let skills: Vec<String> = serde_json::from_value(skills.clone())
            .map_err(|_| MarketError::validation("Skills must be a list of text values"))?;
        update.skills = Some(canonical_tags(&skills));
    }

    if update.is_empty() {
        return Err(MarketError::validation("No updates provided"));
    }

    Ok(update)
}
