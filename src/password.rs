use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    EmptyInput,
    #[error("password does not match")]
    Mismatch,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// bcrypt with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(cost: u32) -> Self {
        PasswordHasher { cost }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.is_empty() {
            return Err(PasswordError::EmptyInput);
        }
        bcrypt::hash(plaintext, self.cost).map_err(|err| PasswordError::Hashing(err.to_string()))
    }

    pub fn verify(&self, hash: &str, plaintext: &str) -> Result<(), PasswordError> {
        if plaintext.is_empty() || hash.is_empty() {
            return Err(PasswordError::EmptyInput);
        }
        match bcrypt::verify(plaintext, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasswordError::Mismatch),
            Err(err) => Err(PasswordError::Hashing(err.to_string())),
        }
    }
}
