use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Form body of the password login. The backend reads `username` as the account email.
#[derive(Debug, Serialize)]
pub struct UserLogin<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub exam_candidate: Option<String>,
}

impl UserProfile {
    pub fn is_student(&self) -> bool {
        self.role == "student"
    }
}
