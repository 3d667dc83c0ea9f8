//! `sightline-identity` — Identity store for Sightline.
//!
//! Users, roles, and claims persisted in `SQLite`, with optimistic
//! concurrency via per-row concurrency stamps. Password hashing is
//! delegated to `sightline-crypto-core`.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod db;
pub mod error;
pub mod options;
pub mod stamps;

pub mod validators;

pub mod claims;
pub mod roles;
pub mod users;

pub mod role_manager;
pub mod user_manager;

pub use claims::Claim;
pub use db::IdentityDb;
pub use error::{IdentityError, PasswordViolation};
pub use options::{IdentityOptions, LockoutOptions, PasswordOptions, UserOptions};
pub use role_manager::RoleManager;
pub use roles::Role;
pub use stamps::normalize_key;
pub use user_manager::{CreateUserRequest, SignInOutcome, UserManager};
pub use users::User;
