//! On-disk fallback cache.
//!
//! Each top-level collection of the family state is kept in its own JSON
//! file, next to two small text files holding the current family id and
//! the logged-in phone number:
//!
//! ```text
//! <dir>/recipes.json
//! <dir>/plans.json
//! <dir>/meal_logs.json
//! <dir>/users.json
//! <dir>/shopping_cart.json
//! <dir>/family_id
//! <dir>/phone
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use chefs_journal_core::{AppState, FamilyId, PhoneNumber};

use crate::error::CacheError;

const RECIPES: &str = "recipes.json";
const PLANS: &str = "plans.json";
const MEAL_LOGS: &str = "meal_logs.json";
const USERS: &str = "users.json";
const SHOPPING_CART: &str = "shopping_cart.json";
const FAMILY_ID: &str = "family_id";
const PHONE: &str = "phone";

/// A directory of cached collections.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Open (creating if needed) the cache directory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    /// The cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the cached state; missing collections come back empty.
    ///
    /// # Errors
    ///
    /// Returns error if a file exists but cannot be read or parsed.
    pub async fn load_state(&self) -> Result<AppState, CacheError> {
        Ok(AppState {
            recipes: self.read_json(RECIPES).await?.unwrap_or_default(),
            plans: self.read_json(PLANS).await?.unwrap_or_default(),
            meal_logs: self.read_json(MEAL_LOGS).await?.unwrap_or_default(),
            users: self.read_json(USERS).await?.unwrap_or_default(),
            shopping_cart: self.read_json(SHOPPING_CART).await?.unwrap_or_default(),
        })
    }

    /// Write every collection of `state`.
    ///
    /// # Errors
    ///
    /// Returns error if a file cannot be written.
    pub async fn save_state(&self, state: &AppState) -> Result<(), CacheError> {
        self.write_json(RECIPES, &state.recipes).await?;
        self.write_json(PLANS, &state.plans).await?;
        self.write_json(MEAL_LOGS, &state.meal_logs).await?;
        self.write_json(USERS, &state.users).await?;
        self.write_json(SHOPPING_CART, &state.shopping_cart).await
    }

    /// The remembered family id.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or holds an invalid code.
    pub async fn family_id(&self) -> Result<Option<FamilyId>, CacheError> {
        let Some(raw) = self.read_text(FAMILY_ID).await? else {
            return Ok(None);
        };
        FamilyId::parse(&raw)
            .map(Some)
            .map_err(|e| self.invalid(FAMILY_ID, &e))
    }

    /// Remember the family id.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn set_family_id(&self, id: &FamilyId) -> Result<(), CacheError> {
        self.write_bytes(FAMILY_ID, id.as_str().as_bytes()).await
    }

    /// The remembered phone number.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or holds an invalid phone.
    pub async fn phone(&self) -> Result<Option<PhoneNumber>, CacheError> {
        let Some(raw) = self.read_text(PHONE).await? else {
            return Ok(None);
        };
        PhoneNumber::parse(&raw)
            .map(Some)
            .map_err(|e| self.invalid(PHONE, &e))
    }

    /// Remember the phone number.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn set_phone(&self, phone: &PhoneNumber) -> Result<(), CacheError> {
        self.write_bytes(PHONE, phone.as_str().as_bytes()).await
    }

    /// Forget the logged-in identity (logout). Cached collections stay.
    ///
    /// # Errors
    ///
    /// Returns error if a file exists but cannot be removed.
    pub async fn forget_identity(&self) -> Result<(), CacheError> {
        for name in [PHONE, FAMILY_ID] {
            let path = self.dir.join(name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        Ok(())
    }

    fn invalid(&self, name: &str, err: &dyn std::fmt::Display) -> CacheError {
        CacheError::Invalid {
            path: self.dir.join(name),
            message: err.to_string(),
        }
    }

    async fn read_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    async fn read_text(&self, name: &str) -> Result<Option<String>, CacheError> {
        let Some(bytes) = self.read_bytes(name).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CacheError> {
        let Some(bytes) = self.read_bytes(name).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Json {
                path: self.dir.join(name),
                source,
            })
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Json {
            path: self.dir.join(name),
            source,
        })?;
        self.write_bytes(name, &bytes).await
    }

    /// Write through a temporary file so readers never see a torn file.
    async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| CacheError::Io { path, source })
    }
}
