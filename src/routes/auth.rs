use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tera::{Context, Tera};

use crate::helper::flash_helpers::{found, set_notification, take_notification};
use crate::middleware::remember_user;
use crate::models::db_operations::users_db_operations;
use crate::models::ActingUser;
use crate::DbPool;

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::get().to(show_login_form))
        .route("/login", web::post().to(handle_login))
        .route("/logout", web::post().to(handle_logout));
}

async fn show_login_form(session: Session, tera: web::Data<Tera>, user: Option<ActingUser>) -> impl Responder {
    if user.is_some() {
        return found("/");
    }
    let mut ctx = Context::new();
    if let Some(notification) = take_notification(&session) {
        ctx.insert("notification", &notification);
    }
    match tera.render("auth/login.html", &ctx) {
        Ok(rendered) => HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered),
        Err(err) => {
            log::error!("Template rendering error for 'auth/login.html': {}", err);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

async fn handle_login(session: Session, pool: web::Data<DbPool>, form: web::Form<LoginForm>) -> impl Responder {
    let login = form.into_inner();
    let conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for login: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    match users_db_operations::verify_credentials(&conn, login.username.trim(), &login.password) {
        Some(user) => {
            if let Err(e) = remember_user(&session, &user) {
                log::error!("Failed to store user '{}' in session: {}", user.username, e);
                return HttpResponse::InternalServerError().finish();
            }
            log::info!("User '{}' logged in.", user.username);
            set_notification(&session, &format!("Welcome back, {}.", user.username), "success");
            found("/")
        }
        None => {
            log::warn!("Failed login attempt for '{}'.", login.username.trim());
            set_notification(&session, "Invalid credentials or account suspended.", "error");
            found("/login")
        }
    }
}

async fn handle_logout(session: Session) -> impl Responder {
    session.purge();
    found("/")
}
