//! Contact details a user can share with others.

use std::sync::LazyLock;

use circle_id::UserId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s]{2,}$").expect("name regex is valid"));

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{1,3}\s\d{10}$").expect("phone regex is valid"));

static WALLET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z0-9]{5,}-)*[a-z0-9]{5,}$").expect("wallet regex is valid")
});

/// A user's contact details.
///
/// `access_list` is maintained by the node; callers send it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserDetails {
    pub user_id: UserId,

    /// Letters and spaces, at least two.
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    /// `+<country code> <10 digits>`, for example `+91 1234567890`.
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    /// Dash-separated groups of at least five alphanumerics.
    #[validate(custom(function = "validate_wallet"))]
    pub wallet_address: String,

    #[serde(default)]
    pub access_list: Vec<UserId>,
}

impl UserDetails {
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        wallet_address: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            wallet_address: wallet_address.into(),
            access_list: Vec::new(),
        }
    }
}

fn validate_name(value: &str) -> Result<(), ValidationError> {
    check(&NAME_REGEX, value, "name")
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    check(&PHONE_REGEX, value, "phone")
}

fn validate_wallet(value: &str) -> Result<(), ValidationError> {
    check(&WALLET_REGEX, value, "wallet_address")
}

fn check(regex: &Regex, value: &str, code: &'static str) -> Result<(), ValidationError> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(code))
    }
}
