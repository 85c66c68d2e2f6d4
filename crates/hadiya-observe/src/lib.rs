//! Observability setup for the Hadiya chat client: structured logging via
//! `tracing-subscriber` and optional OpenTelemetry span export.

pub mod tracing_setup;
