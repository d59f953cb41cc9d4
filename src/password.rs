use crate::error::PageError;

/// Hashes a password with bcrypt off the async executor.
pub async fn hash(password: &str, cost: u32) -> Result<String, PageError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| {
            tracing::error!("password hashing task failed: {:?}", e);
            PageError::Internal("Failed to hash password".to_string())
        })?
        .map_err(|e| {
            tracing::error!("Failed to hash password: {:?}", e);
            PageError::Internal("Failed to hash password".to_string())
        })
}

/// Checks a password against a stored hash. A malformed hash never matches.
pub async fn verify(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(Ok(valid)) => valid,
        Ok(Err(e)) => {
            tracing::warn!("Password verification error: {:?}", e);
            false
        }
        Err(e) => {
            tracing::error!("password verification task failed: {:?}", e);
            false
        }
    }
}
