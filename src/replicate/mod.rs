pub mod client;
pub mod types;

pub use client::ReplicateClient;
pub use types::{ModelVersion, Prediction, PredictionPage, PredictionStatus};
