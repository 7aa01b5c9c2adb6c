//! Cirrus State Management
//!
//! Persists what Cirrus manages: every resource's ARM identifier, the
//! attributes last read from Azure and the schema version they were
//! written with.
//!
//! - **StateFile**: the resources under management
//! - **StateBackend**: storage for the state file plus the lock guarding it
//! - **LockInfo**: who holds the lock, for which operation, until when
//!
//! # Example
//!
//! ```ignore
//! use cirrus_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local())?;
//! backend.init().await?;
//!
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... modify resources ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
