use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// JWT claims issued by the account service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: UserRole,
    pub exp: usize,
}

/// Extracted from a validated bearer token on every request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
}
