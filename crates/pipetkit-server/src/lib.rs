//! # PipetKit Server
//!
//! The outward-facing facade for one pipette instrument: maps abstract
//! operation names and payloads onto command orchestrator calls and
//! maps the typed error taxonomy to transport status codes. Pure
//! routing — all safety checks live in the orchestrator.

pub mod dispatcher;
pub mod service;

pub use dispatcher::{status_code, Dispatcher, FacadeResponse, Operation, ResponseStatus};
pub use service::{serve, serve_listener, spawn_keepalive, ServiceConfig};
