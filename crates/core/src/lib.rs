pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod stores;

pub use errors::CoreError;
pub use models::granularity::{DateRange, Granularity, LookupWindow};
pub use models::performance::{
    AggregatePerformance, PerformanceMetrics, PerformanceQuery, PerformanceRequest,
    PortfolioPerformance, ValuePoint,
};
pub use models::settings::PerformanceSettings;
pub use services::performance_service::PerformanceService;
pub use stores::memory::InMemoryLedgerStore;
