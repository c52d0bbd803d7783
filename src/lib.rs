pub mod artifacts;
pub mod boosted_trees;
pub mod dashboard;
pub mod error;
pub mod fbref_import;
pub mod features;
pub mod forecast_context;
pub mod linear_model;
pub mod model;
pub mod observation;
pub mod observation_db;
pub mod observation_store;
pub mod predictor;
pub mod settings;
pub mod synthetic;
pub mod trainer;
pub mod training_set;

pub use error::{ForecastError, Result};
