//! Test support: a scripted connection manager and, behind `test-utils-postgres`, an
//! embedded PostgreSQL server.

pub mod mock;

#[cfg(feature = "test-utils-postgres")]
pub mod postgres;

pub use mock::{LoggedStatement, MockConnection, MockManager, MockReply};
