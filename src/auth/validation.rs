//! Signup form checks, run before anything is sent

use thiserror::Error;

/// Institutional mail domain derived from the student number
pub const STUDENT_MAIL_DOMAIN: &str = "dut4life.ac.za";

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignupFieldError {
    #[error("Only numbers are allowed.")]
    StudentNumber,
    #[error("Password should be at least 8 characters long.")]
    Password,
    #[error("{0} is required.")]
    Missing(&'static str),
}

/// Details collected by the signup form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub student_number: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Left empty to use the institutional address
    pub email: String,
    pub faculty: String,
    pub department: String,
    pub course: String,
    /// Accepted the terms of use and policies
    pub agreed: bool,
}

pub fn validate_student_number(value: &str) -> Result<(), SignupFieldError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(SignupFieldError::StudentNumber)
    }
}

pub fn validate_password(value: &str) -> Result<(), SignupFieldError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        Err(SignupFieldError::Password)
    } else {
        Ok(())
    }
}

pub fn student_email(student_number: &str) -> String {
    format!("{student_number}@{STUDENT_MAIL_DOMAIN}")
}

impl SignupForm {
    /// Every problem with the form, in field order. Empty means submittable.
    pub fn validate(&self) -> Vec<SignupFieldError> {
        let required = [
            ("Student number", &self.student_number),
            ("Password", &self.password),
            ("First name", &self.first_name),
            ("Last name", &self.last_name),
            ("Faculty", &self.faculty),
            ("Department", &self.department),
            ("Qualification", &self.course),
        ];

        let mut errors: Vec<SignupFieldError> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| SignupFieldError::Missing(*name))
            .collect();

        if let Err(e) = validate_student_number(&self.student_number) {
            errors.push(e);
        }
        if !self.password.is_empty() {
            if let Err(e) = validate_password(&self.password) {
                errors.push(e);
            }
        }
        errors
    }

    pub fn email(&self) -> String {
        if self.email.trim().is_empty() {
            student_email(&self.student_number)
        } else {
            self.email.clone()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}
