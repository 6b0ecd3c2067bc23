pub mod algorithm;
pub mod cancellation;
pub mod encoder;
pub mod orchestrator;
pub mod poller;
pub mod types;
