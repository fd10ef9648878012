pub mod clock;
pub mod command;
pub mod complaint;
pub mod config;
pub mod duplicate_detector;
pub mod engine;
pub mod error;
pub mod escalation_linker;
pub mod event;
pub mod lifecycle;
pub mod location;
pub mod notify;
pub mod rng;
pub mod store;
pub mod submission;
pub mod types;
pub mod verification_gate;
