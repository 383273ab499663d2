//! Classifier adapters.

pub mod http;
