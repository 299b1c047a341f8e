use crate::error::AppError;

/// Hash a plaintext password for storage.
pub fn hash(plaintext: &str) -> Result<String, AppError> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a plaintext password against a stored hash - constant-time via bcrypt.
pub fn verify(plaintext: &str, hashed: &str) -> bool {
    bcrypt::verify(plaintext, hashed).unwrap_or(false)
}
