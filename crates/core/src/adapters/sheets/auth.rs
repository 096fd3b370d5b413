use error_stack::ResultExt;
use google_sheets4::hyper;
use google_sheets4::oauth2::{self, authenticator::Authenticator};
use thiserror::Error;
use tracing::instrument;

use super::http_client::HttpsConnector;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not build the HTTPS client")]
    HttpClient,
    #[error("could not read service account key")]
    CredentialsUnreadable,
    #[error("could not create an authenticator")]
    AuthenticatorBuild,
    #[error("service account authorization was refused")]
    Authorization,
}

/// Builds a service-account authenticator and fetches a first token, so bad credentials surface
/// at startup instead of on the first spreadsheet call.
#[instrument(skip(client))]
pub async fn auth(
    credentials_path: &str,
    client: hyper::Client<HttpsConnector>,
) -> error_stack::Result<Authenticator<HttpsConnector>, AuthError> {
    let secret: oauth2::ServiceAccountKey = oauth2::read_service_account_key(credentials_path)
        .await
        .change_context(AuthError::CredentialsUnreadable)
        .attach_printable_lazy(|| format!("credentials file: {}", credentials_path))?;

    let authenticator = oauth2::ServiceAccountAuthenticator::with_client(secret, client)
        .build()
        .await
        .change_context(AuthError::AuthenticatorBuild)?;

    authenticator
        .token(&[SPREADSHEETS_SCOPE, DRIVE_SCOPE])
        .await
        .change_context(AuthError::Authorization)
        .attach_printable_lazy(|| format!("scopes: {}, {}", SPREADSHEETS_SCOPE, DRIVE_SCOPE))?;

    tracing::debug!("Service account authorized");
    Ok(authenticator)
}
