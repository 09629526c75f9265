use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse};
use url::Url;

use crate::helper::content_service::{Redirect, RedirectTarget};
use crate::models::Notification;

const NOTIFICATION_KEY: &str = "notification";

pub fn set_notification(session: &Session, message: &str, r#type: &str) {
    let notification = Notification { message: message.to_string(), r#type: r#type.to_string() };
    if let Err(e) = session.insert(NOTIFICATION_KEY, &notification) {
        log::error!("Failed to store flash notification in session: {}", e);
    }
}

/// Reads and clears the pending flash notification, if any.
pub fn take_notification(session: &Session) -> Option<Notification> {
    match session.get::<Notification>(NOTIFICATION_KEY) {
        Ok(Some(notification)) => {
            session.remove(NOTIFICATION_KEY);
            Some(notification)
        }
        _ => None,
    }
}

/// Path of the referring page on this site, or `/`. The host part of the
/// referer is dropped so redirects never leave the site.
pub fn back_url(req: &HttpRequest) -> String {
    let referer = req
        .headers()
        .get("referer")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let Some(referer) = referer else { return "/".to_string() };

    let parsed = if referer.starts_with('/') && !referer.starts_with("//") {
        Url::parse("http://localhost").and_then(|base| base.join(referer))
    } else {
        Url::parse(referer)
    };

    let url = match parsed {
        Ok(url) => url,
        Err(_) => return "/".to_string(),
    };
    // A leading `//` or `/\` would be followed by browsers as another host.
    let path = url.path();
    if path.starts_with("//") || path.starts_with("/\\") {
        return "/".to_string();
    }
    match url.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

pub fn found(location: &str) -> HttpResponse {
    HttpResponse::Found().append_header(("location", location)).finish()
}

/// Turns a service redirect into a response, flashing its message first.
pub fn redirect_response(req: &HttpRequest, session: &Session, redirect: &Redirect) -> HttpResponse {
    if let Some(message) = &redirect.message {
        set_notification(session, message, "success");
    }
    match &redirect.to {
        RedirectTarget::Back => found(&back_url(req)),
        RedirectTarget::Path(path) => found(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn back_url_defaults_to_home() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(back_url(&req), "/");
    }

    #[test]
    fn back_url_keeps_path_and_query_but_drops_host() {
        let req = TestRequest::default()
            .insert_header(("referer", "https://evil.example/posts/create?x=1"))
            .to_http_request();
        assert_eq!(back_url(&req), "/posts/create?x=1");

        let relative = TestRequest::default()
            .insert_header(("referer", "/search?search=rust&page=2"))
            .to_http_request();
        assert_eq!(back_url(&relative), "/search?search=rust&page=2");

        let protocol_relative = TestRequest::default()
            .insert_header(("referer", "https://blog.example//evil.example/phish"))
            .to_http_request();
        assert_eq!(back_url(&protocol_relative), "/");

        let backslash = TestRequest::default()
            .insert_header(("referer", "https://blog.example/\\evil.example/phish"))
            .to_http_request();
        assert_eq!(back_url(&backslash), "/");
    }
}
