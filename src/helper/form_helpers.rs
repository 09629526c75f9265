use actix_web::{web, HttpResponse};
use url::form_urlencoded;

use crate::helper::content_service::ServiceError;
use crate::models::PostInput;

/// Decoded urlencoded body. Keeps every pair so repeated fields like `tags[]` survive.
#[derive(Debug, Default)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    /// Parses URL-encoded form data from bytes, handling potential UTF-8 errors gracefully.
    pub fn parse(form_bytes: &web::Bytes) -> Result<Self, HttpResponse> {
        let body = match std::str::from_utf8(form_bytes) {
            Ok(s) => s,
            Err(_) => return Err(HttpResponse::BadRequest().body("Invalid UTF-8 in request body.")),
        };
        Ok(Self {
            pairs: form_urlencoded::parse(body.as_bytes()).into_owned().collect(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }

    fn trimmed(&self, key: &str) -> String {
        self.get(key).map_or("", |s| s.trim()).to_string()
    }
}

/// Reads the post form fields. Only malformed ids fail here; required-field
/// checks belong to the content service.
pub fn post_input_from_form(form: &FormData) -> Result<PostInput, ServiceError> {
    let mut errors = Vec::new();

    let topic_id = match form.get("topic_id").map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push("The selected topic is invalid.".to_string());
                None
            }
        },
        None => None,
    };

    let mut tag_ids = Vec::new();
    for raw in form.get_all("tags").into_iter().chain(form.get_all("tags[]")) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<i64>() {
            Ok(id) if !tag_ids.contains(&id) => tag_ids.push(id),
            Ok(_) => {}
            Err(_) => errors.push("The selected tags are invalid.".to_string()),
        }
    }

    if !errors.is_empty() {
        errors.dedup();
        return Err(ServiceError::Validation(errors));
    }

    Ok(PostInput {
        title: form.trimmed("title"),
        slug_title: form.trimmed("slug_title"),
        body: form.trimmed("body"),
        topic_id,
        tag_ids,
        r#type: form.get("type").map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
    })
}
