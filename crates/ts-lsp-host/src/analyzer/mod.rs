//! The analyzer client (C3): child-process transport, request/response correlation, and event
//! fan-out for the external TypeScript language service host.

pub(crate) mod client;
pub(crate) mod discovery;
pub(crate) mod protocol;
