pub mod content_service;
pub mod flash_helpers;
pub mod form_helpers;
pub mod sanitization_helpers;
