pub mod auth;
pub mod circuit;
pub mod rate_limit;
