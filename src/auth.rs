use thiserror::Error;

const TOKEN_VAR: &str = "MANGADEX_TOKEN";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no access token found; set {TOKEN_VAR} in the environment or .env")]
    MissingToken,
}

/// Read the pre-acquired bearer token from the environment.
///
/// Token acquisition and refresh happen outside this tool; a `.env` file in
/// the working directory is picked up for dev convenience.
pub fn access_token() -> Result<String, AuthError> {
    let _ = dotenvy::dotenv();

    std::env::var(TOKEN_VAR)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or(AuthError::MissingToken)
}
