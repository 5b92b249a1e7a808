pub mod granularity;
pub mod performance;
pub mod portfolio;
pub mod price;
pub mod settings;
