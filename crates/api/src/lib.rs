//! HTTP API: router, authentication, ACL guard and handlers.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
