use crate::helper::content_service::{ContentService, ServiceError};
use crate::helper::flash_helpers::{back_url, found, redirect_response, set_notification, take_notification};
use crate::helper::form_helpers::{post_input_from_form, FormData};
use crate::models::pagination::{Page, PageRequest};
use crate::models::{ActingUser, PostSummary};
use actix_session::Session;
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tera::{Context, Tera};

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<u32>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    search: Option<String>,
    page: Option<u32>,
}

pub fn config_front(cfg: &mut web::ServiceConfig) {
    // `/posts/create` and `/posts/type/{type}` must be registered before `/posts/{slug}`.
    cfg.route("/", web::get().to(index))
        .route("/search", web::get().to(search))
        .route("/posts/create", web::get().to(create_form))
        .route("/posts", web::post().to(store_post))
        .route("/posts/type/{type}", web::get().to(posts_by_type))
        .route("/posts/{id}/edit", web::get().to(edit_form))
        .route("/posts/{slug}", web::get().to(show_post))
        .route("/posts/{id}", web::put().to(update_post))
        .route("/posts/{id}", web::patch().to(update_post))
        .route("/posts/{id}", web::delete().to(destroy_post))
        .route("/posts/{id}", web::post().to(spoofed_post_action))
        .route("/tags/{tag}", web::get().to(posts_by_tag))
        .route("/topics/{topic}", web::get().to(posts_by_topic))
        .route("/questions/{type}", web::post().to(store_question));
}

// --- Rendering and error helpers ---

fn render_with_status(tera: &Tera, template: &str, ctx: &Context, status: StatusCode) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(rendered) => HttpResponse::build(status).content_type("text/html; charset=utf-8").body(rendered),
        Err(err) => {
            log::error!("Template rendering error for '{}': {}", template, err);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

fn render(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    render_with_status(tera, template, ctx, StatusCode::OK)
}

/// Context every full page starts from: the acting user and any pending flash message.
fn page_context(session: &Session, user: Option<&ActingUser>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &user);
    if let Some(notification) = take_notification(session) {
        ctx.insert("notification", &notification);
    }
    ctx
}

fn insert_page(ctx: &mut Context, page: &Page<PostSummary>) {
    ctx.insert("posts", &page.items);
    ctx.insert("pagination", &page.links());
}

fn read_failure(err: ServiceError) -> HttpResponse {
    match err {
        ServiceError::NotFound(what) => {
            log::debug!("Not found: {}", what);
            HttpResponse::NotFound().body("Not Found")
        }
        ServiceError::Forbidden => HttpResponse::Forbidden().body("This action is unauthorized."),
        ServiceError::Validation(errors) => HttpResponse::BadRequest().body(errors.join(" ")),
        ServiceError::Store(e) => {
            log::error!("Failed to read posts: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn write_failure(err: ServiceError, req: &HttpRequest, session: &Session) -> HttpResponse {
    match err {
        ServiceError::Validation(errors) => {
            set_notification(session, &errors.join(" "), "error");
            found(&back_url(req))
        }
        ServiceError::Store(e) => {
            log::error!("Failed to write post: {}", e);
            set_notification(session, "Something went wrong. The post could not be saved.", "error");
            found(&back_url(req))
        }
        other => read_failure(other),
    }
}

// --- Listing handlers ---

async fn index(
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    match service.list_recent(query.page.unwrap_or(1)) {
        Ok(page) => {
            let mut ctx = page_context(&session, user.as_ref());
            insert_page(&mut ctx, &page);
            render(&tera, "front/pages/home.html", &ctx)
        }
        Err(e) => read_failure(e),
    }
}

async fn posts_by_tag(
    tag_id: web::Path<i64>,
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    match service.list_by_tag(tag_id.into_inner(), query.page.unwrap_or(1)) {
        Ok(listing) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("info", &listing.info);
            insert_page(&mut ctx, &listing.posts);
            render(&tera, "front/pages/list-post.html", &ctx)
        }
        Err(e) => read_failure(e),
    }
}

async fn posts_by_topic(
    topic_slug: web::Path<String>,
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    match service.list_by_topic(&topic_slug, query.page.unwrap_or(1)) {
        Ok(listing) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("info", &listing.info);
            insert_page(&mut ctx, &listing.posts);
            render(&tera, "front/pages/list-post.html", &ctx)
        }
        Err(e) => read_failure(e),
    }
}

/// Returns the rendered listing fragment wrapped as `{"html": ...}` for in-page loading.
async fn posts_by_type(
    post_type: web::Path<String>,
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    let page = match service.list_by_type(&post_type, query.page.unwrap_or(1)) {
        Ok(page) => page,
        Err(e) => return read_failure(e),
    };
    let mut ctx = Context::new();
    insert_page(&mut ctx, &page);
    match tera.render("front/partials/home-list.html", &ctx) {
        Ok(html) => HttpResponse::Ok().json(json!({ "html": html })),
        Err(err) => {
            log::error!("Template rendering error for type listing '{}': {}", post_type, err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn search(
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    query: web::Query<SearchQuery>,
) -> HttpResponse {
    let term = query.search.as_deref().unwrap_or("");
    match service.search(term, query.page.unwrap_or(1)) {
        Ok(listing) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("info", &listing.info);
            ctx.insert("search", term.trim());
            insert_page(&mut ctx, &listing.posts);
            render(&tera, "front/pages/search.html", &ctx)
        }
        // Re-render instead of redirecting back, which would loop on the same search URL.
        Err(ServiceError::Validation(errors)) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("notification", &json!({ "message": errors.join(" "), "type": "error" }));
            ctx.insert("info", "");
            ctx.insert("search", term);
            let empty: Page<PostSummary> = Page::new(Vec::new(), PageRequest::new(1, service.per_page()), 0);
            insert_page(&mut ctx, &empty);
            render_with_status(&tera, "front/pages/search.html", &ctx, StatusCode::UNPROCESSABLE_ENTITY)
        }
        Err(e) => read_failure(e),
    }
}

// --- Detail and form handlers ---

async fn show_post(
    slug: web::Path<String>,
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
) -> HttpResponse {
    match service.get_by_slug(&slug, user.as_ref()) {
        Ok(detail) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("post", &detail.post);
            ctx.insert("body_html", &detail.body_html);
            ctx.insert("tags", &detail.tags);
            ctx.insert("topic", &detail.topic);
            ctx.insert("author_name", &detail.author_name);
            ctx.insert("can_manage", &detail.can_manage);
            render(&tera, "front/pages/detail.html", &ctx)
        }
        Err(e) => read_failure(e),
    }
}

async fn create_form(
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
) -> HttpResponse {
    match service.form_options() {
        Ok(options) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("topics", &options.topics);
            ctx.insert("tags", &options.tags);
            render(&tera, "front/pages/post.html", &ctx)
        }
        Err(e) => read_failure(e),
    }
}

async fn edit_form(
    post_id: web::Path<i64>,
    tera: web::Data<Tera>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
) -> HttpResponse {
    match service.edit(post_id.into_inner(), user.as_ref()) {
        Ok(form) => {
            let mut ctx = page_context(&session, user.as_ref());
            ctx.insert("post", &form.post);
            ctx.insert("selected_tag_ids", &form.selected_tag_ids);
            ctx.insert("topics", &form.options.topics);
            ctx.insert("tags", &form.options.tags);
            render(&tera, "front/pages/edit.html", &ctx)
        }
        Err(e) => read_failure(e),
    }
}

// --- Write handlers ---

async fn store_post(
    req: HttpRequest,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    form: web::Bytes,
) -> HttpResponse {
    let parsed = match FormData::parse(&form) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let result = post_input_from_form(&parsed).and_then(|input| service.create(input, user.as_ref()));
    match result {
        Ok(mutation) => redirect_response(&req, &session, &mutation.redirect),
        Err(e) => write_failure(e, &req, &session),
    }
}

async fn store_question(
    req: HttpRequest,
    post_type: web::Path<String>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    form: web::Bytes,
) -> HttpResponse {
    let parsed = match FormData::parse(&form) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let result = post_input_from_form(&parsed)
        .and_then(|input| service.create_question(input, &post_type, user.as_ref()));
    match result {
        Ok(mutation) => redirect_response(&req, &session, &mutation.redirect),
        Err(e) => write_failure(e, &req, &session),
    }
}

fn apply_update(
    req: &HttpRequest,
    service: &ContentService,
    session: &Session,
    user: Option<&ActingUser>,
    post_id: i64,
    form: &FormData,
) -> HttpResponse {
    let result = post_input_from_form(form).and_then(|input| service.update(post_id, input, user));
    match result {
        Ok(mutation) => redirect_response(req, session, &mutation.redirect),
        Err(e) => write_failure(e, req, session),
    }
}

fn apply_delete(req: &HttpRequest, service: &ContentService, session: &Session, user: Option<&ActingUser>, post_id: i64) -> HttpResponse {
    match service.delete(post_id, user) {
        Ok(mutation) => redirect_response(req, session, &mutation.redirect),
        Err(e) => write_failure(e, req, session),
    }
}

async fn update_post(
    req: HttpRequest,
    post_id: web::Path<i64>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    form: web::Bytes,
) -> HttpResponse {
    let parsed = match FormData::parse(&form) {
        Ok(p) => p,
        Err(response) => return response,
    };
    apply_update(&req, &service, &session, user.as_ref(), post_id.into_inner(), &parsed)
}

async fn destroy_post(
    req: HttpRequest,
    post_id: web::Path<i64>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
) -> HttpResponse {
    apply_delete(&req, &service, &session, user.as_ref(), post_id.into_inner())
}

/// HTML forms can only POST, so `_method` selects PUT/PATCH/DELETE.
async fn spoofed_post_action(
    req: HttpRequest,
    post_id: web::Path<i64>,
    service: web::Data<ContentService>,
    session: Session,
    user: Option<ActingUser>,
    form: web::Bytes,
) -> HttpResponse {
    let parsed = match FormData::parse(&form) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let method = parsed.get("_method").unwrap_or("").trim().to_ascii_uppercase();
    match method.as_str() {
        "PUT" | "PATCH" => apply_update(&req, &service, &session, user.as_ref(), post_id.into_inner(), &parsed),
        "DELETE" => apply_delete(&req, &service, &session, user.as_ref(), post_id.into_inner()),
        _ => HttpResponse::MethodNotAllowed().finish(),
    }
}
