use serde::Deserialize;

use crate::auth::local::SignupInput;

/// Login form body. Not `Debug`: it carries a password.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Signup form body.
#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl From<SignupForm> for SignupInput {
    fn from(form: SignupForm) -> Self {
        Self {
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            password: form.password,
        }
    }
}

/// Query string of the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
