//! Durable storage for the access/refresh token pair.
//!
//! Stores are synchronous and never touch the network. Mutations are
//! infallible from the caller's point of view: a store that fails to persist
//! logs a warning and keeps serving its in-memory state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::TokenStoreError;
use crate::secret::SecretString;

/// Holder of the current access and refresh tokens.
pub trait TokenStore: Send + Sync {
    /// Current access token, if any.
    fn access_token(&self) -> Option<SecretString>;

    /// Current refresh token, if any.
    fn refresh_token(&self) -> Option<SecretString>;

    /// Replace both tokens in one step.
    fn set_tokens(&self, access: SecretString, refresh: SecretString);

    /// Replace the access token, leaving the refresh token untouched.
    fn update_access_token(&self, access: SecretString);

    /// Forget both tokens. Calling it on an empty store is a no-op.
    fn remove_tokens(&self);

    /// `true` when an access token is present. Expiry is not checked.
    fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

#[derive(Clone, Default)]
struct Tokens {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

/// Process-local token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair.
    #[must_use]
    pub fn with_tokens(access: impl Into<SecretString>, refresh: impl Into<SecretString>) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access: Some(access.into()),
                refresh: Some(refresh.into()),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<SecretString> {
        self.tokens.read().access.clone()
    }

    fn refresh_token(&self) -> Option<SecretString> {
        self.tokens.read().refresh.clone()
    }

    fn set_tokens(&self, access: SecretString, refresh: SecretString) {
        *self.tokens.write() = Tokens {
            access: Some(access),
            refresh: Some(refresh),
        };
    }

    fn update_access_token(&self, access: SecretString) {
        self.tokens.write().access = Some(access);
    }

    fn remove_tokens(&self) {
        *self.tokens.write() = Tokens::default();
    }
}

/// On-disk layout of the token file.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TokenFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl Drop for TokenFile {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

/// Token store persisted as a small JSON document.
///
/// The file holds the keys `accessToken` and `refreshToken`. Every mutation
/// is written through (temp file + rename); [`remove_tokens`] deletes the
/// file.
///
/// [`remove_tokens`]: TokenStore::remove_tokens
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<Tokens>,
}

impl FileTokenStore {
    /// Default location: `<data_dir>/learnlens/tokens.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("learnlens").join("tokens.json"))
    }

    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store. A file that is not valid JSON is
    /// ignored with a warning (it is overwritten on the next login).
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError::Io`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TokenStoreError> {
        let path = path.into();
        let tokens = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<TokenFile>(&raw) {
                Ok(mut file) => Tokens {
                    access: file.access_token.take().map(SecretString::from),
                    refresh: file.refresh_token.take().map(SecretString::from),
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "token file is not valid JSON; starting without a session"
                    );
                    Tokens::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Tokens::default(),
            Err(source) => return Err(TokenStoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            tokens: Mutex::new(tokens),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tokens: &Tokens) {
        if let Err(e) = write_token_file(&self.path, tokens) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist tokens; keeping them in memory only"
            );
        }
    }
}

fn write_token_file(path: &Path, tokens: &Tokens) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = TokenFile {
        access_token: tokens.access.as_ref().map(|s| s.expose().to_owned()),
        refresh_token: tokens.refresh.as_ref().map(|s| s.expose().to_owned()),
    };
    let body = zeroize::Zeroizing::new(serde_json::to_vec_pretty(&file)?);

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body.as_slice())?;
    fs::rename(&tmp, path)
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<SecretString> {
        self.tokens.lock().access.clone()
    }

    fn refresh_token(&self) -> Option<SecretString> {
        self.tokens.lock().refresh.clone()
    }

    fn set_tokens(&self, access: SecretString, refresh: SecretString) {
        let mut tokens = self.tokens.lock();
        *tokens = Tokens {
            access: Some(access),
            refresh: Some(refresh),
        };
        self.persist(&tokens);
    }

    fn update_access_token(&self, access: SecretString) {
        let mut tokens = self.tokens.lock();
        tokens.access = Some(access);
        self.persist(&tokens);
    }

    fn remove_tokens(&self) {
        let mut tokens = self.tokens.lock();
        *tokens = Tokens::default();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to delete token file"
            ),
        }
    }
}
