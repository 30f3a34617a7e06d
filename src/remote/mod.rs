//! Remote service contract and read-side index.

pub mod api;
pub mod index;

pub use api::{CaseFields, HttpRemoteApi, RemoteApi, RemoteCase, RemoteSuite};
pub use index::RemoteIndex;
