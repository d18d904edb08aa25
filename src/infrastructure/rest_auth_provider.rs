// Login/refresh against the ThingsBoard auth endpoints
use crate::application::collaborators::AuthProvider;
use crate::domain::auth::AuthToken;
use crate::domain::error::AuthError;
use crate::infrastructure::thingsboard_api::{ThingsboardApi, failure_parts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    token: String,
    refresh_token: String,
}

struct Session {
    token: AuthToken,
    refresh_token: String,
}

/// Host session credentials. Logins and rotations are serialized.
pub struct RestAuthProvider {
    api: ThingsboardApi,
    username: String,
    password: String,
    session: Mutex<Option<Session>>,
}

impl RestAuthProvider {
    pub fn new(api: ThingsboardApi, username: String, password: String) -> Self {
        Self {
            api,
            username,
            password,
            session: Mutex::new(None),
        }
    }

    /// Current access token of the host session, logging in if there is none.
    pub async fn session_token(&self) -> Result<AuthToken, AuthError> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            return Ok(current.token.clone());
        }
        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *session = Some(fresh);
        Ok(token)
    }

    async fn login(&self) -> Result<Session, AuthError> {
        tracing::debug!(username = %self.username, "Logging in");
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };
        self.request_pair("/api/auth/login", &body).await
    }

    async fn rotate(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let body = RefreshRequest { refresh_token };
        self.request_pair("/api/auth/token", &body).await
    }

    async fn request_pair<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Session, AuthError> {
        let response = self
            .api
            .client()
            .post(self.api.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(AuthError::Status { status, body });
        }

        let pair = response
            .json::<TokenPair>()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;
        Ok(Session {
            token: AuthToken::new(pair.token),
            refresh_token: pair.refresh_token,
        })
    }
}

#[async_trait]
impl AuthProvider for RestAuthProvider {
    async fn refresh_token(&self) -> Result<AuthToken, AuthError> {
        let mut session = self.session.lock().await;

        let rotated = match session.as_ref() {
            Some(current) => match self.rotate(&current.refresh_token).await {
                Ok(next) => Some(next),
                Err(e) => {
                    tracing::warn!(error = %e, "Token rotation failed, logging in again");
                    None
                }
            },
            None => None,
        };

        let next = match rotated {
            Some(next) => next,
            None => self.login().await?,
        };
        let token = next.token.clone();
        *session = Some(next);
        Ok(token)
    }
}
