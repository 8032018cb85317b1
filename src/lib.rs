pub mod config;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod indicator;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod provider;
pub mod store;
