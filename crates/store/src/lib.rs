mod error;
pub mod postgres;
mod traits;

#[cfg(feature = "test-util")]
pub mod memory;

pub use error::StoreError;
pub use postgres::PgStore;
pub use traits::Store;
