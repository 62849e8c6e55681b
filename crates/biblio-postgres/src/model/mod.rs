//! Database models for all entities in the system.

mod user;

pub use self::user::{NewUser, UpdateUser, User};
