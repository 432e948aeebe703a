//! Input validation for API requests.
//!
//! Validators return `Err(message)`; handlers collect them into an
//! `ApiError` with the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::db::{CreateReportRequest, RegisterRequest, UpdateReportRequest};

lazy_static! {
    /// Loose email shape check: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// HTTP/HTTPS URL with a host
    static ref HTTP_URL_REGEX: Regex = Regex::new(
        r"^https?://[^\s/?#]+([/?#]\S*)?$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a non-empty text field
pub fn validate_required(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

/// Validate a link submitted for upload-by-link
pub fn validate_http_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err("Link is required".to_string());
    }

    if url.len() > 2048 {
        return Err("Link is too long (max 2048 characters)".to_string());
    }

    if !HTTP_URL_REGEX.is_match(url) {
        return Err("Link must be an http(s) URL".to_string());
    }

    Ok(())
}

pub fn validate_register(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if req.password.is_empty() {
        errors.add("password", "Password is required");
    }

    errors.finish()
}

fn check_photo_urls(errors: &mut ValidationErrorBuilder, photos: &[String]) {
    for (i, photo) in photos.iter().enumerate() {
        if photo.trim().is_empty() {
            errors.add("addedPhotos", format!("Photo {} has an empty URL", i));
        }
    }
}

pub fn validate_create_report(req: &CreateReportRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_required("Title", &req.title) {
        errors.add("title", e);
    }
    check_photo_urls(&mut errors, &req.added_photos);

    errors.finish()
}

/// A report keeps a title for life: it may change but never be cleared
pub fn validate_update_report(req: &UpdateReportRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_required("Report id", &req.id) {
        errors.add("id", e);
    }
    match &req.changes.title {
        Some(Some(title)) => {
            if let Err(e) = validate_required("Title", title) {
                errors.add("title", e);
            }
        }
        Some(None) => {
            errors.add("title", "Title cannot be removed");
        }
        None => {}
    }
    if let Some(Some(photos)) = &req.changes.added_photos {
        check_photo_urls(&mut errors, photos);
    }

    errors.finish()
}
