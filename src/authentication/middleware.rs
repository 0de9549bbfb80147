use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_identity_token, IdentityClaims};
use crate::constants::SESSION_COOKIE;

#[derive(Debug)]
struct Unauthorized;

impl reject::Reject for Unauthorized {}

pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (IdentityClaims,), Error = Rejection> + Clone {
    warp::cookie::<String>(SESSION_COOKIE).and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            match verify_identity_token(&session, &secret) {
                Ok(claims) => Ok(claims),
                Err(_) => Err(warp::reject::custom(Unauthorized)),
            }
        }
    })
}

/// Anonymous viewers and invalid sessions both resolve to `None`.
pub fn with_possible_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Option<IdentityClaims>,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(move |session: Option<String>| {
        session.and_then(|session| verify_identity_token(&session, &secret).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::jwt::generate_identity_token;

    const SECRET: &str = "test-secret";

    fn cookie() -> String {
        let claims = IdentityClaims::new("giulia", "giulia@example.com", "Giulia");
        let token = generate_identity_token(&claims, SECRET).unwrap_or_default();
        format!("{SESSION_COOKIE}={token}")
    }

    #[tokio::test]
    async fn sessions_require_a_valid_cookie() {
        let filter = with_session(Arc::from(SECRET));

        let claims = warp::test::request().header("cookie", cookie()).filter(&filter).await;
        assert!(matches!(claims, Ok(c) if c.sub == "giulia"));

        let missing = warp::test::request().filter(&filter).await;
        assert!(missing.is_err());

        let forged = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}=forged"))
            .filter(&filter)
            .await;
        assert!(forged.is_err());
    }

    #[tokio::test]
    async fn possible_sessions_never_reject() {
        let filter = with_possible_session(Arc::from(SECRET));

        let anonymous = warp::test::request().filter(&filter).await;
        assert!(matches!(anonymous, Ok(None)));

        let viewer = warp::test::request().header("cookie", cookie()).filter(&filter).await;
        assert!(matches!(viewer, Ok(Some(c)) if c.email == "giulia@example.com"));
    }
}
