use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

use super::{rfc3339, Coordinates, GeoPoint};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Client,
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Provider => "PROVIDER",
        }
    }
}

/// The authenticated caller, tagged by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Client(ObjectId),
    Provider(ObjectId),
}

impl Actor {
    pub fn new(id: ObjectId, role: Role) -> Self {
        match role {
            Role::Client => Actor::Client(id),
            Role::Provider => Actor::Provider(id),
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            Actor::Client(id) | Actor::Provider(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Client(_) => Role::Client,
            Actor::Provider(_) => Role::Provider,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub location: GeoPoint,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub total_reviews: i64,
    #[serde(default)]
    pub completed_tasks: i64,
    #[serde(default)]
    pub response_rate: f64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn is_provider(&self) -> bool {
        self.role == Role::Provider
    }
}

/// Canonical form of a category or skill tag.
pub fn canonical_tag(tag: &str) -> String {
    tag.trim().to_uppercase()
}

pub fn canonical_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| canonical_tag(t)).filter(|t| !t.is_empty()) {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct RegisterDto {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub role: Role,
    #[serde(default, alias = "services")]
    pub skills: Vec<String>,
    pub location: Option<Coordinates>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<GeoPoint>,
    pub skills: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.location.is_none() && self.skills.is_none()
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub skills: Vec<String>,
    /// Absent when the user never supplied a location.
    pub location: Option<Coordinates>,
    pub rating: f64,
    pub total_reviews: i64,
    pub completed_tasks: i64,
    pub response_rate: f64,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email,
            name: user.name,
            role: user.role,
            skills: user.skills,
            location: user.location.known().copied().map(Coordinates::from),
            rating: user.rating,
            total_reviews: user.total_reviews,
            completed_tasks: user.completed_tasks,
            response_rate: user.response_rate,
            created_at: rfc3339(user.created_at),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RankedProviderResponse {
    #[serde(flatten)]
    pub provider: UserResponse,
    pub priority_score: f64,
    /// Kilometres from the query point, one decimal, display only.
    #[schemars(description = "Kilometres from the query point, rounded for display")]
    pub distance_km: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_in_uppercase() {
        assert_eq!(serde_json::to_value(Role::Provider).unwrap(), "PROVIDER");
        let role: Role = serde_json::from_str("\"CLIENT\"").unwrap();
        assert_eq!(role, Role::Client);
    }

    #[test]
    fn actor_dispatches_on_role() {
        let id = ObjectId::new();
        let actor = Actor::new(id, Role::Provider);
        assert_eq!(actor, Actor::Provider(id));
        assert_eq!(actor.id(), id);
        assert_eq!(actor.role(), Role::Provider);
    }

    #[test]
    fn canonical_tags_are_uppercase_and_deduplicated() {
        let tags = vec![
            " plumbing".to_string(),
            "PLUMBING".to_string(),
            "".to_string(),
            "electrical ".to_string(),
        ];
        assert_eq!(canonical_tags(&tags), vec!["PLUMBING", "ELECTRICAL"]);
    }
}
