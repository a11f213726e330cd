//! Field checks applied at the HTTP boundary. Nothing that fails here
//! reaches a service.

use crate::error::ApiError;

#[derive(Default)]
pub struct Checks {
    errors: Vec<String>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, msg: String) {
        self.errors.push(msg);
    }

    fn length(&mut self, label: &str, value: &str, min: usize, max: usize) -> bool {
        let len = value.chars().count();
        if len == 0 {
            self.fail(format!("Please enter your {}.", label.to_lowercase()));
            false
        } else if len < min || len > max {
            self.fail(format!("{} must be between {} and {} characters.", label, min, max));
            false
        } else {
            true
        }
    }

    /// Letters and spaces.
    pub fn person_name(&mut self, label: &str, value: &str) -> &mut Self {
        if self.length(label, value, 2, 20)
            && !value.chars().all(|c| c.is_alphabetic() || c == ' ')
        {
            self.fail(format!("{} can only contain letters.", label));
        }
        self
    }

    /// Letters, digits and spaces.
    pub fn username(&mut self, value: &str) -> &mut Self {
        if self.length("Username", value, 2, 20)
            && !value.chars().all(|c| c.is_alphanumeric() || c == ' ')
        {
            self.fail("Username can only contain letters and numbers.".into());
        }
        self
    }

    pub fn email(&mut self, value: &str) -> &mut Self {
        if self.length("Email", value, 2, 70) {
            let valid = match value.split_once('@') {
                Some((local, domain)) => {
                    !local.is_empty()
                        && !domain.is_empty()
                        && !domain.contains('@')
                        && !value.contains(char::is_whitespace)
                }
                None => false,
            };
            if !valid {
                self.fail("Invalid email address.".into());
            }
        }
        self
    }

    /// 4 to 20 characters with at least one upper- and one lowercase letter.
    pub fn password(&mut self, value: &str) -> &mut Self {
        if self.length("Password", value, 4, 20)
            && !(value.chars().any(char::is_uppercase) && value.chars().any(char::is_lowercase))
        {
            self.fail(
                "Password needs to contain at least one uppercase and one lowercase letter.".into(),
            );
        }
        self
    }

    pub fn confirmation(&mut self, password: &str, confirm: &str) -> &mut Self {
        if confirm.is_empty() {
            self.fail("Please confirm your password.".into());
        } else if password != confirm {
            self.fail("Passwords do not match.".into());
        }
        self
    }

    pub fn post(&mut self, title: &str, content: &str) -> &mut Self {
        self.length("Title", title, 2, 70);
        self.length("Content", content, 2, 300);
        self
    }

    pub fn secret(&mut self, value: &str) -> &mut Self {
        self.length("Secret", value, 2, 50);
        self
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(checks: &mut Checks) -> Vec<String> {
        match checks.finish() {
            Ok(()) => Vec::new(),
            Err(ApiError::Validation(errs)) => errs,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn good_registration_passes() {
        let mut checks = Checks::new();
        checks
            .person_name("First name", "Ada")
            .person_name("Last name", "Lovelace")
            .email("ada@example.com")
            .username("ada1815")
            .password("Engine1843")
            .confirmation("Engine1843", "Engine1843");
        assert!(errors(&mut checks).is_empty());
    }

    #[test]
    fn every_failure_is_reported() {
        let mut checks = Checks::new();
        checks
            .person_name("First name", "A")
            .person_name("Last name", "L0velace")
            .email("not-an-email")
            .username("")
            .password("lowercase")
            .confirmation("lowercase", "different");
        let errs = errors(&mut checks);
        assert_eq!(errs.len(), 6);
        assert!(errs.contains(&"Please enter your username.".to_string()));
        assert!(errs.contains(&"Passwords do not match.".to_string()));
    }

    #[test]
    fn post_bounds() {
        let long = "x".repeat(301);
        let mut checks = Checks::new();
        checks.post("Hi", &long);
        assert_eq!(errors(&mut checks), vec!["Content must be between 2 and 300 characters."]);
    }

    #[test]
    fn secret_bounds() {
        let mut checks = Checks::new();
        checks.secret("x");
        assert_eq!(errors(&mut checks).len(), 1);

        let mut checks = Checks::new();
        checks.secret("xyz");
        assert!(errors(&mut checks).is_empty());
    }
}
