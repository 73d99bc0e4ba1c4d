//! Validated request inputs.
//!
//! Each input is built once by `validate` from a raw JSON body and is
//! immutable afterwards. Validation chains rules over overlapping property
//! subsets the same way for every resource: presence first, then type,
//! then format.

use crate::validation::{pick, validate_properties, Rule, ValidationResult};
use serde_json::{Map, Number, Value};

/// Category create/update body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    name: String,
}

impl CategoryInput {
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        let props = pick(body, &["name"]);
        validate_properties(&props, &Rule::Required)?;
        validate_properties(&props, &Rule::String)?;

        Ok(Self {
            name: text(&props, "name"),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Product (category sub-document) create/update body.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    name: String,
    description: String,
    quantity: Number,
}

impl ProductInput {
    /// `description` is optional and defaults to an empty string.
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        validate_properties(&pick(body, &["name", "quantity"]), &Rule::Required)?;

        let mut texts = pick(body, &["name", "description"]);
        if texts.get("description").is_some_and(Value::is_null) {
            texts.insert("description".to_string(), Value::String(String::new()));
        }
        validate_properties(&texts, &Rule::String)?;

        let quantity = pick(body, &["quantity"]);
        validate_properties(&quantity, &Rule::Number)?;

        Ok(Self {
            name: text(&texts, "name"),
            description: text(&texts, "description"),
            quantity: match quantity.get("quantity") {
                Some(Value::Number(number)) => number.clone(),
                _ => Number::from(0),
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> &Number {
        &self.quantity
    }
}

/// Username/password login body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    username: String,
    password: String,
}

impl LoginInput {
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        let props = pick(body, &["username", "password"]);
        validate_properties(&props, &Rule::Required)?;
        validate_properties(&props, &Rule::String)?;
        validate_properties(&pick(body, &["password"]), &Rule::PasswordPattern)?;

        Ok(Self {
            username: text(&props, "username"),
            password: text(&props, "password"),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Body carrying a single opaque token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInput {
    token: String,
}

impl TokenInput {
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        let props = pick(body, &["token"]);
        validate_properties(&props, &Rule::Required)?;
        validate_properties(&props, &Rule::String)?;

        Ok(Self {
            token: text(&props, "token"),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Forgotten-password / verification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailInput {
    email: String,
}

impl EmailInput {
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        let props = pick(body, &["email"]);
        validate_properties(&props, &Rule::Required)?;
        validate_properties(&props, &Rule::String)?;
        validate_properties(&props, &Rule::Email)?;

        Ok(Self {
            email: text(&props, "email"),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// New password plus its confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChangeInput {
    password: String,
}

impl PasswordChangeInput {
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        let props = pick(body, &["password", "confirmPassword"]);
        validate_properties(&props, &Rule::Required)?;
        validate_properties(&props, &Rule::PasswordPattern)?;
        let password = text(&props, "password");
        confirm_password(&password, &props)?;

        Ok(Self { password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Password reset through a previously issued reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPasswordInput {
    token: String,
    password: String,
}

impl ResetPasswordInput {
    pub fn validate(body: &Value) -> ValidationResult<Self> {
        let props = pick(body, &["resetPasswordToken", "newPassword", "confirmPassword"]);
        validate_properties(&props, &Rule::Required)?;
        validate_properties(&props, &Rule::String)?;
        validate_properties(
            &pick(body, &["newPassword", "confirmPassword"]),
            &Rule::PasswordPattern,
        )?;
        let password = text(&props, "newPassword");
        confirm_password(&password, &props)?;

        Ok(Self {
            token: text(&props, "resetPasswordToken"),
            password,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

fn confirm_password(password: &str, props: &Map<String, Value>) -> ValidationResult<()> {
    let expected = props
        .get("confirmPassword")
        .cloned()
        .unwrap_or(Value::Null);
    let mut check = Map::new();
    check.insert("password".to_string(), Value::String(password.to_string()));
    validate_properties(&check, &Rule::MatchesExpectedValue(expected))
}

fn text(props: &Map<String, Value>, key: &str) -> String {
    props
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
