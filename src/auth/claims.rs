use serde::{Deserialize, Serialize};

/// JWT payload carried in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,       // user id (hex)
    pub username: String,
    pub is_verified: bool,
    pub iat: i64,          // issued at (unix timestamp)
    pub nbf: i64,          // not before
    pub exp: i64,          // expires at
    pub aud: String,
    pub iss: String,
}
