use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use std::sync::Arc;
use tera::Tera;

use crate::helper::content_service::{ContentService, POST_CREATED_MESSAGE, POST_UPDATED_MESSAGE};
use crate::models::db_operations::{posts_db_operations, taxonomy_db_operations, users_db_operations};
use crate::models::policy::OwnershipPolicy;
use crate::models::post_store::SqlitePostStore;
use crate::models::{ActingUser, Post, PostInput};
use crate::setup::db_setup::test_pool;
use crate::DbPool;

const PASSWORD: &str = "correct horse";
const PER_PAGE: u32 = 2;

fn content_service(pool: &DbPool) -> ContentService {
    ContentService::new(Arc::new(SqlitePostStore::new(pool.clone())), Arc::new(OwnershipPolicy), PER_PAGE)
}

fn seed_user(pool: &DbPool, username: &str, role: &str) -> ActingUser {
    let conn = pool.get().unwrap();
    let id = users_db_operations::create_user_with_cost(&conn, username, PASSWORD, role, 4).unwrap();
    ActingUser { id, username: username.to_string(), role: role.to_string() }
}

fn seed_post(pool: &DbPool, title: &str, owner: Option<&ActingUser>) -> Post {
    let input = PostInput {
        title: title.to_string(),
        slug_title: title.to_string(),
        body: format!("All about **{}**", title),
        ..PostInput::default()
    };
    content_service(pool).create(input, owner).unwrap().record
}

fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response().cookies().find(|c| c.name() == "id").map(|c| c.into_owned())
}

fn location<B>(resp: &ServiceResponse<B>) -> &str {
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or("")
}

macro_rules! init_app {
    ($pool:expr) => {{
        let tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html")).unwrap();
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64]))
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new(tera))
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(content_service(&$pool)))
                .configure(crate::configure_app),
        )
        .await
    }};
}

macro_rules! login {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("username", $username), ("password", PASSWORD)])
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/");
        session_cookie(&resp).expect("login sets a session cookie")
    }};
}

async fn body_text<B: actix_web::body::MessageBody>(resp: ServiceResponse<B>) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
}

#[actix_web::test]
async fn home_lists_only_active_posts() {
    let pool = test_pool();
    seed_post(&pool, "Visible Post", None);
    let hidden = seed_post(&pool, "Hidden Post", None);
    {
        let conn = pool.get().unwrap();
        conn.execute("UPDATE posts SET active = 0 WHERE id = ?1", [hidden.id]).unwrap();
    }
    let app = init_app!(pool);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("Visible Post"));
    assert!(!body.contains("Hidden Post"));
}

#[actix_web::test]
async fn detail_renders_markdown_and_unknown_slug_is_404() {
    let pool = test_pool();
    let post = seed_post(&pool, "Markdown Post", None);
    let app = init_app!(pool);

    let resp = test::call_service(&app, test::TestRequest::get().uri(&format!("/posts/{}", post.slug)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("<strong>Markdown Post</strong>"));

    let missing = test::call_service(&app, test::TestRequest::get().uri("/posts/no-such-post").to_request()).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn create_redirects_back_and_flashes_on_next_page() {
    let pool = test_pool();
    let app = init_app!(pool);

    let req = test::TestRequest::post()
        .uri("/posts")
        .insert_header((header::REFERER, "http://localhost/posts/create"))
        .set_form([("title", "My First Post"), ("slug_title", "My First Post"), ("body", "Hello there")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts/create");
    let cookie = session_cookie(&resp).unwrap();

    let post = {
        let conn = pool.get().unwrap();
        posts_db_operations::read_post_by_slug(&conn, "my-first-post").unwrap().unwrap()
    };
    assert!(post.active);
    assert_eq!(post.user_id, None);

    let home = test::call_service(&app, test::TestRequest::get().uri("/").cookie(cookie).to_request()).await;
    let body = body_text(home).await;
    assert!(body.contains(POST_CREATED_MESSAGE));
    assert!(body.contains("My First Post"));
}

#[actix_web::test]
async fn invalid_create_flashes_errors_and_stores_nothing() {
    let pool = test_pool();
    let app = init_app!(pool);

    let req = test::TestRequest::post()
        .uri("/posts")
        .insert_header((header::REFERER, "/posts/create"))
        .set_form([("title", ""), ("slug_title", "x"), ("body", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts/create");
    let cookie = session_cookie(&resp).unwrap();

    {
        let conn = pool.get().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    let form = test::call_service(&app, test::TestRequest::get().uri("/posts/create").cookie(cookie).to_request()).await;
    assert!(body_text(form).await.contains("The title field is required."));
}

#[actix_web::test]
async fn logged_in_create_assigns_owner_and_tags() {
    let pool = test_pool();
    let alice = seed_user(&pool, "alice", "member");
    let tag = {
        let conn = pool.get().unwrap();
        taxonomy_db_operations::create_tag(&conn, "rust").unwrap()
    };
    let app = init_app!(pool);
    let cookie = login!(app, "alice");

    let tag_id = tag.id.to_string();
    let req = test::TestRequest::post()
        .uri("/posts")
        .cookie(cookie)
        .set_form(vec![
            ("title", "Owned Post"),
            ("slug_title", "owned-post"),
            ("body", "Mine"),
            ("tags[]", tag_id.as_str()),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let conn = pool.get().unwrap();
    let post = posts_db_operations::read_post_by_slug(&conn, "owned-post").unwrap().unwrap();
    assert_eq!(post.user_id, Some(alice.id));
    let tags = posts_db_operations::read_tags_for_post(&conn, post.id).unwrap();
    assert_eq!(tags, vec![tag]);
}

#[actix_web::test]
async fn edit_requires_manage_permission() {
    let pool = test_pool();
    let alice = seed_user(&pool, "alice", "member");
    seed_user(&pool, "bob", "member");
    let post = seed_post(&pool, "Alice Post", Some(&alice));
    let app = init_app!(pool);
    let edit_uri = format!("/posts/{}/edit", post.id);

    let anonymous = test::call_service(&app, test::TestRequest::get().uri(&edit_uri).to_request()).await;
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

    let bob = login!(app, "bob");
    let denied = test::call_service(&app, test::TestRequest::get().uri(&edit_uri).cookie(bob).to_request()).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(denied).await, "This action is unauthorized.");

    let alice_cookie = login!(app, "alice");
    let allowed = test::call_service(&app, test::TestRequest::get().uri(&edit_uri).cookie(alice_cookie).to_request()).await;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert!(body_text(allowed).await.contains("Alice Post"));
}

#[actix_web::test]
async fn owner_updates_through_method_spoofing() {
    let pool = test_pool();
    let alice = seed_user(&pool, "alice", "member");
    let post = seed_post(&pool, "Before", Some(&alice));
    let app = init_app!(pool);
    let cookie = login!(app, "alice");

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}", post.id))
        .cookie(cookie)
        .insert_header((header::REFERER, format!("/posts/{}/edit", post.id)))
        .set_form([("_method", "PUT"), ("title", "After"), ("slug_title", "after"), ("body", "Updated")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/edit", post.id));
    let cookie = session_cookie(&resp).unwrap();

    let updated = {
        let conn = pool.get().unwrap();
        posts_db_operations::read_post_by_id(&conn, post.id).unwrap().unwrap()
    };
    assert_eq!(updated.title, "After");
    assert_eq!(updated.slug, "after");
    assert_eq!(updated.seo_title, "after");
    assert!(updated.active);

    let page = test::call_service(&app, test::TestRequest::get().uri("/").cookie(cookie).to_request()).await;
    assert!(body_text(page).await.contains(POST_UPDATED_MESSAGE));
}

#[actix_web::test]
async fn delete_by_stranger_is_forbidden_and_owner_deletes() {
    let pool = test_pool();
    let alice = seed_user(&pool, "alice", "member");
    seed_user(&pool, "bob", "member");
    let post = seed_post(&pool, "Doomed", Some(&alice));
    let app = init_app!(pool);
    let uri = format!("/posts/{}", post.id);

    let bob = login!(app, "bob");
    let denied = test::call_service(&app, test::TestRequest::delete().uri(&uri).cookie(bob).to_request()).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let alice_cookie = login!(app, "alice");
    let req = test::TestRequest::post()
        .uri(&uri)
        .cookie(alice_cookie)
        .set_form([("_method", "DELETE")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let missing = test::call_service(&app, test::TestRequest::get().uri("/posts/doomed").to_request()).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn tag_and_topic_listings_show_banner() {
    let pool = test_pool();
    let alice = seed_user(&pool, "alice", "member");
    let (tag, topic) = {
        let conn = pool.get().unwrap();
        (
            taxonomy_db_operations::create_tag(&conn, "rust").unwrap(),
            taxonomy_db_operations::create_topic(&conn, "Systems", "systems").unwrap(),
        )
    };
    let input = PostInput {
        title: "Tagged".to_string(),
        slug_title: "tagged".to_string(),
        body: "Body".to_string(),
        topic_id: Some(topic.id),
        tag_ids: vec![tag.id],
        r#type: None,
    };
    content_service(&pool).create(input, Some(&alice)).unwrap();
    seed_post(&pool, "Untagged", None);
    let app = init_app!(pool);

    let by_tag = test::call_service(&app, test::TestRequest::get().uri(&format!("/tags/{}", tag.id)).to_request()).await;
    assert_eq!(by_tag.status(), StatusCode::OK);
    let body = body_text(by_tag).await;
    assert!(body.contains("Posts found with tag <strong>rust</strong>"));
    assert!(body.contains("Tagged"));
    assert!(!body.contains("Untagged"));

    let by_topic = test::call_service(&app, test::TestRequest::get().uri("/topics/systems").to_request()).await;
    assert!(body_text(by_topic).await.contains("Posts for Topic: <strong>Systems</strong>"));

    let unknown = test::call_service(&app, test::TestRequest::get().uri("/topics/nope").to_request()).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn question_sets_type_and_type_listing_returns_html_json() {
    let pool = test_pool();
    let app = init_app!(pool);

    let req = test::TestRequest::post()
        .uri("/questions/question")
        .set_form([("title", "How do lifetimes work"), ("slug_title", "lifetimes"), ("body", "Please explain")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");

    let listing = test::call_service(&app, test::TestRequest::get().uri("/posts/type/question").to_request()).await;
    assert_eq!(listing.status(), StatusCode::OK);
    let json: serde_json::Value = test::read_body_json(listing).await;
    assert!(json["html"].as_str().unwrap().contains("How do lifetimes work"));

    let other = test::call_service(&app, test::TestRequest::get().uri("/posts/type/article").to_request()).await;
    let json: serde_json::Value = test::read_body_json(other).await;
    assert!(!json["html"].as_str().unwrap().contains("How do lifetimes work"));
}

#[actix_web::test]
async fn search_keeps_term_in_pagination_links() {
    let pool = test_pool();
    for title in ["Rust One", "Rust Two", "Rust Three", "Go Four"] {
        seed_post(&pool, title, None);
    }
    let app = init_app!(pool);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/search?search=Rust").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("Posts found with search: <strong>Rust</strong>"));
    assert!(body.contains("search=Rust&amp;page=2"));
    assert!(!body.contains("Go Four"));

    let empty = test::call_service(&app, test::TestRequest::get().uri("/search?search=+").to_request()).await;
    assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(empty).await.contains("The search field is required."));
}

#[actix_web::test]
async fn failed_login_and_logout() {
    let pool = test_pool();
    seed_user(&pool, "alice", "member");
    let app = init_app!(pool);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "alice"), ("password", "wrong")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");

    let cookie = login!(app, "alice");
    let form = test::call_service(&app, test::TestRequest::get().uri("/login").cookie(cookie.clone()).to_request()).await;
    assert_eq!(form.status(), StatusCode::FOUND);

    let logout = test::call_service(&app, test::TestRequest::post().uri("/logout").cookie(cookie).to_request()).await;
    assert_eq!(logout.status(), StatusCode::FOUND);
    assert_eq!(location(&logout), "/");
}
