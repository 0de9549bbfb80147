use std::sync::Arc;

use potion::HtmlError;
use tokio::sync::watch;

use super::{
    jwt::{verify_identity_token, SessionData},
    permissions::UserRole,
};
use crate::database::{actions::users, store::DocumentStore};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// The host has not resolved a session yet.
    Loading,
    SignedOut,
    SignedIn(SessionData),
}

impl AuthState {
    pub fn session(&self) -> Option<&SessionData> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            _ => None,
        }
    }
}

/// Current viewer, passed explicitly to whatever needs it. Observers
/// subscribe to state changes.
pub struct AuthContext<S> {
    store: Arc<S>,
    secret: String,
    state: watch::Sender<AuthState>,
}

impl<S: DocumentStore> AuthContext<S> {
    pub fn new(store: Arc<S>, secret: &str) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);

        Self {
            store,
            secret: secret.to_string(),
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<SessionData> {
        self.state.borrow().session().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Verifies an identity token and loads the matching profile. An invalid
    /// token leaves the context signed out.
    pub async fn sign_in(&self, token: &str) -> Result<SessionData, potion::Error> {
        let claims = match verify_identity_token(token, &self.secret) {
            Ok(claims) => claims,
            Err(e) => {
                self.state.send_replace(AuthState::SignedOut);
                return Err(e);
            }
        };

        let profile = users::get_user(self.store.as_ref(), &claims.sub).await?;
        let session = SessionData::new(&claims, profile.as_ref());

        log::debug!("> Signed in as {}", session.user_id);
        self.state.send_replace(AuthState::SignedIn(session.to_owned()));
        Ok(session)
    }

    /// Re-reads the profile of the signed in user.
    pub async fn reload(&self) -> Result<(), potion::Error> {
        let Some(mut session) = self.session() else {
            return Ok(());
        };

        if let Some(profile) = users::get_user(self.store.as_ref(), &session.user_id).await? {
            session.display_name = profile.visible_name().to_string();
            session.is_admin = profile.admin;
            session.role = UserRole::from_admin_flag(profile.admin);
        }

        // a sign out while the profile loaded wins
        if self.session().is_some() {
            self.state.send_replace(AuthState::SignedIn(session));
        }
        Ok(())
    }

    pub async fn update_display_name(&self, display_name: &str) -> Result<(), potion::Error> {
        let session = self
            .session()
            .ok_or_else(|| HtmlError::InvalidSession.new("Not signed in"))?;

        users::update_display_name(self.store.as_ref(), &session, display_name).await?;
        self.reload().await
    }

    pub fn sign_out(&self) {
        self.state.send_replace(AuthState::SignedOut);
    }
}
