use crate::database::ProductInput;
use anyhow::{bail, Result};
use regex::Regex;
use std::sync::OnceLock;

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_TEXT_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 10_000;

fn email_regex() -> Option<&'static Regex> {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

fn url_regex() -> Option<&'static Regex> {
    URL_REGEX
        .get_or_init(|| Regex::new(r"^https?://[a-zA-Z0-9.-]+(:[0-9]{1,5})?(/\S*)?$").ok())
        .as_ref()
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        bail!("Email cannot be empty");
    }
    if email.len() > MAX_TEXT_LEN {
        bail!("Email is too long (max {} characters)", MAX_TEXT_LEN);
    }
    match email_regex() {
        Some(re) if re.is_match(email) => Ok(()),
        _ => bail!("Invalid email format"),
    }
}

pub fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        bail!("URL cannot be empty");
    }
    if url.len() > 2048 {
        bail!("URL is too long (max 2048 characters)");
    }
    match url_regex() {
        Some(re) if re.is_match(url) => Ok(()),
        _ => bail!("Invalid URL format (must start with http:// or https://)"),
    }
}

pub fn validate_mobile(mobile: &str) -> Result<()> {
    if mobile.trim().is_empty() {
        bail!("Mobile number cannot be empty");
    }
    // Digits plus common separators
    if !mobile
        .chars()
        .all(|c| c.is_ascii_digit() || " +()-".contains(c))
    {
        bail!("Invalid mobile number format");
    }
    let digit_count = mobile.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digit_count) {
        bail!("Mobile number must have 7-15 digits");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
    }
    if len > MAX_PASSWORD_LEN {
        bail!("Password must be at most {} characters", MAX_PASSWORD_LEN);
    }
    Ok(())
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} cannot be empty", field);
    }
    if value.chars().count() > max_len {
        bail!("{} is too long (max {} characters)", field, max_len);
    }
    Ok(())
}

/// Check product fields. On create every catalog field except thumb, images
/// and quantity must be present; on update only the supplied ones are checked.
pub fn validate_product_input(input: &ProductInput, creating: bool) -> Result<()> {
    let text_fields = [
        ("title", &input.title, MAX_TEXT_LEN),
        ("description", &input.description, MAX_DESCRIPTION_LEN),
        ("brand", &input.brand, MAX_TEXT_LEN),
        ("category", &input.category, MAX_TEXT_LEN),
        ("color", &input.color, MAX_TEXT_LEN),
    ];
    for (field, value, max_len) in text_fields {
        match value {
            Some(value) => validate_text(field, value, max_len)?,
            None if creating => bail!("Missing input: {}", field),
            None => {}
        }
    }

    match input.price {
        Some(price) if !price.is_finite() || price < 0.0 => {
            bail!("Price must be a non-negative number")
        }
        None if creating => bail!("Missing input: price"),
        _ => {}
    }
    if matches!(input.quantity, Some(quantity) if quantity < 0) {
        bail!("Quantity cannot be negative");
    }

    if let Some(thumb) = &input.thumb {
        validate_url(thumb)?;
    }
    for image in input.images.iter().flatten() {
        validate_url(image)?;
    }
    Ok(())
}
