use crate::app::AppState;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// How long a session token stays valid
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// A registered application user
///
/// Only the Argon2 hash of the password is ever stored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Email address
    pub email: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,
}

/// Credential data for login and registration
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Username for login/registration
    pub username: String,

    /// Email address (optional for login, required for registration)
    #[serde(default)]
    pub email: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// An authenticated user session
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// JSON-file backed user account store
///
/// Accounts live in a single JSON map keyed by username; every mutation
/// rewrites the file.
pub struct UserStore {
    path: PathBuf,
    inner: RwLock<HashMap<String, User>>,
}

impl UserStore {
    /// Open the user store, creating an empty one if the file is absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        let users = if path.exists() {
            let mut contents = String::new();
            let mut file =
                File::open(&path).map_err(|_| "Failed to open users file".to_string())?;
            file.read_to_string(&mut contents)
                .map_err(|_| "Failed to read users file".to_string())?;
            serde_json::from_str(&contents).map_err(|_| "Failed to parse users data".to_string())?
        } else {
            if let Some(parent) = path.parent() {
                create_dir_all(parent).map_err(|_| "Failed to create data directory".to_string())?;
            }
            HashMap::new()
        };

        Ok(Self {
            path,
            inner: RwLock::new(users),
        })
    }

    fn persist(&self, users: &HashMap<String, User>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|_| "Failed to serialize users data".to_string())?;
        fs::write(&self.path, json).map_err(|_| "Failed to write users file".to_string())
    }

    /// Register a new user account
    ///
    /// # Errors
    /// * Returns an error if any field is empty or the username/email is taken
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<(), String> {
        if username.is_empty() || password.is_empty() || email.is_empty() {
            return Err("Username, email and password cannot be empty".to_string());
        }

        let mut users = self.inner.write().unwrap();
        if users.contains_key(username) {
            return Err("Username already exists".to_string());
        }
        if users.values().any(|user| user.email == email) {
            return Err("Email address is already registered".to_string());
        }

        let password_hash = hash_password(password)?;
        users.insert(
            username.to_string(),
            User {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            },
        );
        self.persist(&users)
    }

    /// Check whether the provided username and password match a registered user
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, String> {
        let users = self.inner.read().unwrap();
        if let Some(user) = users.get(username) {
            verify_password(password, &user.password_hash)
        } else {
            Ok(false)
        }
    }
}

/// In-memory session token store
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for an authenticated user and return its token
    pub fn create(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            user_id: username.to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(SESSION_DURATION),
        };
        self.inner.write().unwrap().insert(token.clone(), session);
        token
    }

    /// Resolve a token to its username if the session is valid and unexpired
    pub fn validate(&self, token: &str) -> Option<String> {
        let sessions = self.inner.read().unwrap();
        if let Some(session) = sessions.get(token) {
            if session.expires_at > SystemTime::now() {
                return Some(session.user_id.clone());
            }
        }
        None
    }

    /// Drop a session token
    pub fn revoke(&self, token: &str) {
        self.inner.write().unwrap().remove(token);
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// The authenticated caller, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Pull a session token from the Authorization header or the session cookie
fn extract_token(request: &Request, jar: &CookieJar) -> Option<String> {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            let token = value
                .strip_prefix("Token ")
                .or_else(|| value.strip_prefix("Bearer "));
            if let Some(token) = token {
                return Some(token.to_string());
            }
        }
    }
    jar.get("session").map(|c| c.value().to_string())
}

/// Authentication middleware for the dataset API
///
/// Resolves the caller's session and stores the username in the request
/// extensions; unauthenticated API calls get a 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(token) = extract_token(&request, &jar) {
        if let Some(username) = state.sessions.validate(&token) {
            request.extensions_mut().insert(CurrentUser(username));
            return next.run(request).await;
        }
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication required"})),
    )
        .into_response()
}

/// Handle user registration
///
/// # Returns
/// * `Response` - 201 on success, 400 with the reason otherwise
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<UserCredentials>,
) -> Response {
    match state
        .users
        .register(&credentials.username, &credentials.email, &credentials.password)
    {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({"user": credentials.username})),
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({"error": e}))).into_response(),
    }
}

/// Handle user login
///
/// Validates credentials and creates a session. The token is returned in the
/// body for header-based clients and also set as a cookie for browsers.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Response {
    match state.users.verify(&credentials.username, &credentials.password) {
        Ok(true) => {
            let token = state.sessions.create(&credentials.username);
            let cookie = Cookie::new("session", token.clone());
            (
                jar.add(cookie),
                Json(json!({"token": token, "user": credentials.username})),
            )
                .into_response()
        }
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid username or password"})),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Authentication error"})),
        )
            .into_response(),
    }
}

/// Handle user logout
///
/// Revokes the caller's session and clears the cookie.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> impl IntoResponse {
    if let Some(token) = extract_token(&request, &jar) {
        state.sessions.revoke(&token);
    }
    let cookie = Cookie::new("session", "");
    (jar.add(cookie), Redirect::to("/"))
}
