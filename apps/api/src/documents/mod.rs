// Documents: DOCX intake, persistence and the caller-facing operations.
// Placeholder semantics live in crate::placeholders; this module wires them to storage.

pub mod docx;
pub mod handlers;
pub mod service;
pub mod store;
