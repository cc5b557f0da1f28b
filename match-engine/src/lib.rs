//! Match lifecycle, invitations, join requests, ratings and notifications
//! for a padel matchmaking service, over a pluggable document store.

pub mod clock;
pub mod error;
pub mod identity;
pub mod memory;
pub mod models;
pub mod services;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{WorkflowError, WorkflowResult};
pub use identity::{Actor, AuthEvent, Identity, IdentityError, IdentityProvider, Session};
pub use memory::MemoryStore;
pub use services::{Dispatcher, Settings, Workflow};
pub use store::{DocumentStore, StoreError, StoreResult};
