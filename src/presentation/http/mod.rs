//! HTTP Surface
//!
//! Routes and request handlers for the plain request/response API.

pub mod handlers;
pub mod routes;
