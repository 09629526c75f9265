use actix_session::{Session, SessionExt};
use actix_web::{dev, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::models::ActingUser;

const USER_ID_KEY: &str = "user_id";
const USERNAME_KEY: &str = "username";
const ROLE_KEY: &str = "role";

/// Resolves the logged-in user from the cookie session.
/// Handlers that also serve guests take `Option<ActingUser>`.
impl FromRequest for ActingUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        if let (Ok(Some(id)), Ok(Some(username)), Ok(Some(role))) = (
            session.get::<i64>(USER_ID_KEY),
            session.get::<String>(USERNAME_KEY),
            session.get::<String>(ROLE_KEY),
        ) {
            ready(Ok(ActingUser { id, username, role }))
        } else {
            ready(Err(actix_web::error::ErrorUnauthorized("Not logged in.")))
        }
    }
}

pub fn remember_user(session: &Session, user: &ActingUser) -> Result<(), actix_session::SessionInsertError> {
    session.renew();
    session.insert(USER_ID_KEY, user.id)?;
    session.insert(USERNAME_KEY, &user.username)?;
    session.insert(ROLE_KEY, &user.role)?;
    Ok(())
}
