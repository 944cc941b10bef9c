//! Web API module
//!
//! JSON endpoints for the inbound message bridge, scene inspection and
//! viewer controls. [`routes::create_router`] builds the router.

pub mod api;
pub mod routes;
