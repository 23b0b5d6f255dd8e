use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String, // normalized, unique
    pub password_hash: Option<String>, // argon2 PHC string, local signups only
    pub federated_id: Option<String>,  // provider subject, set at most once
    pub first_name: String,
    pub last_name: String,
    pub profile_picture_url: Option<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Row to insert. Either `password_hash` or `federated_id` must be present.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub federated_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture_url: Option<String>,
}

/// Unique columns a failed insert can collide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    FederatedId,
}

/// Outcome of an insert that respects the storage-level unique constraints.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(User),
    Conflict(UniqueField),
}
