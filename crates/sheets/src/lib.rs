//! Tabular store access: the gateway trait, the Google Sheets client behind it, an in-memory
//! store for tests and local runs, and the two repositories the assistant works with.

pub mod auth;
pub mod client;
pub mod gateway;
pub mod memory;
pub mod repositories;

pub use auth::{AccessTokenProvider, ServiceAccountKey, ServiceAccountTokenSource, StaticAccessToken};
pub use client::{GoogleSheetsStore, SheetsSettings};
pub use gateway::{CellValue, StoreError, TabularStore, ValueRange};
pub use memory::{InMemoryTabularStore, StoreSeed};
pub use repositories::{BookingGrid, ClaimOutcome, GridSnapshot, UserRegistry};
