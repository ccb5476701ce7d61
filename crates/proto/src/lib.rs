//! Generated gRPC clients and servers for the internal services.
//!
//! Timestamps cross the wire as RFC 3339 strings and structured attribute
//! maps as JSON strings; both are parsed at the service boundary.

pub mod account {
    tonic::include_proto!("ledger.account");
}

pub mod ingestion {
    tonic::include_proto!("ledger.ingestion");
}

pub mod query {
    tonic::include_proto!("ledger.query");
}

pub mod convert;

