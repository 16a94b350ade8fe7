//! In-memory accession API stub.
//!
//! Serves the endpoints that `seedbank-client` calls, backed by an
//! [`InMemoryAccessionRepository`](seedbank_accession::InMemoryAccessionRepository).
//! Data is lost on restart. Used for local development and for exercising
//! the client end to end without a backend.

pub mod routes;

pub use routes::router;
