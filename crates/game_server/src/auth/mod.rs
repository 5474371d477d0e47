//! Account lookup and login handling.
//!
//! - [`AccountRepository`] is the storage seam; [`InMemoryAccountRepository`]
//!   backs development servers and tests.
//! - [`AccountWorkerPool`] bounds concurrent repository access.
//! - [`Authenticator`] turns credentials into an [`AuthOutcome`].
//! - [`LoginService`] consumes login requests from the router.

mod account;
mod repository;
mod service;
mod workers;

pub use account::{Account, AccountId};
pub use repository::{AccountRepository, InMemoryAccountRepository, RepositoryError};
pub use service::{AuthOutcome, Authenticator, LoginService};
pub use workers::{AccountJob, AccountWorkerPool, SubmitError};
