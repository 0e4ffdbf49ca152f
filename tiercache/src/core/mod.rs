pub mod clock;
pub mod error;
pub mod keys;
pub mod memory_store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, IdentityError, Result, StorageError};
pub use keys::{CacheKey, PARAMS_DELIMITER, canonicalize, generate_key};
pub use memory_store::MemoryStore;
pub use types::{CacheEntry, CacheStats};
