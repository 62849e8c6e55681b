//! Database query repositories.
//!
//! Repositories provide high-level, single-record operations over a raw
//! connection; pooling and domain mapping live a layer up in
//! [`PgUserStore`](crate::PgUserStore).

pub mod user;

pub use self::user::UserRepository;
