use std::sync::Arc;

use tracing::warn;

use slotbook_core::domain::{UserId, UserProfile};
use slotbook_core::grid::CellRange;

use crate::gateway::{StoreError, TabularStore};

const REGISTRY_FIRST_COLUMN: u32 = 1;
const REGISTRY_LAST_COLUMN: u32 = 3;

/// Append-only user table: `user id | display name | external id`, columns A..C.
pub struct UserRegistry {
    store: Arc<dyn TabularStore>,
    sheet: String,
}

impl UserRegistry {
    pub fn new(store: Arc<dyn TabularStore>, sheet: impl Into<String>) -> Self {
        Self { store, sheet: sheet.into() }
    }

    /// First row whose id cell equals the decimal user id and which has all three cells.
    pub async fn find(&self, user: UserId) -> Result<Option<UserProfile>, StoreError> {
        let range = CellRange::columns(REGISTRY_FIRST_COLUMN, REGISTRY_LAST_COLUMN)?;
        let rows = self.store.read_range(&self.sheet, &range).await.map_err(|error| {
            warn!(
                event_name = "registry.lookup_failed",
                user_id = %user,
                error = %error,
                "user registry lookup failed"
            );
            error
        })?;

        let wanted = user.to_string();
        let profile = rows
            .rows()
            .iter()
            .filter(|row| row.len() > 2)
            .find(|row| row[0].as_str() == wanted)
            .map(|row| UserProfile::new(row[1].as_str(), row[2].as_str()));
        Ok(profile)
    }

    pub async fn register(&self, user: UserId, profile: &UserProfile) -> Result<(), StoreError> {
        let values =
            vec![user.to_string(), profile.display_name.clone(), profile.external_id.clone()];
        self.store.append_row(&self.sheet, values).await.map_err(|error| {
            warn!(
                event_name = "registry.append_failed",
                user_id = %user,
                error = %error,
                "user registry append failed"
            );
            error
        })
    }
}
