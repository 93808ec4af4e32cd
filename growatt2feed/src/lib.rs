// externally visible interfaces
pub mod controller;
pub mod decision;
pub mod gateway_config;
pub mod gateway_wrapper;
pub mod sources;
pub mod targets;

// internal interfaces
mod growatt;
