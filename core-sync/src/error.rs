use provider_spotify::SpotifyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The access token was rejected mid-iteration. Drives the bounded
    /// refresh-and-retry machine; never escapes a cycle.
    #[error("Authorization expired")]
    AuthExpired,

    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    #[error("Credential error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Service call failed: {0}")]
    Provider(SpotifyError),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("No curator credential configured")]
    NoCuratorCredential,

    #[error("Curator credential has no linked user")]
    CuratorNotLinked,

    #[error("Remote playlist creation failed for definition {0}")]
    RemoteCreateFailed(String),
}

impl From<SpotifyError> for SyncError {
    fn from(e: SpotifyError) -> Self {
        match e {
            SpotifyError::Unauthorized => SyncError::AuthExpired,
            other => SyncError::Provider(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
