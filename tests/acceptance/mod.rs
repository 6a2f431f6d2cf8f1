//! End-to-end scenarios for the pulse sampler.

mod common;
mod config_test;
mod polling_test;
mod trigger_test;
