pub mod clock;
pub mod config;
pub mod doctor;
pub mod error;
pub mod prices;
pub mod reports;
pub mod sessions;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LiveConfig, SourcesConfig};
pub use doctor::{
    BackendStatus, CacheInfo, NO_SOURCE_MESSAGE, PricingStatus, SetupReport, validate_setup,
};
pub use error::{Error, Result};
pub use prices::{PriceReport, load_prices, load_prices_with};
pub use reports::{PeriodReport, ProjectReport, load_period_report, load_project_report};
pub use sessions::{SessionsReport, WorkflowReport, load_sessions_report};
pub use tracker::{
    InteractionUpdate, LiveWorkflowTracker, StopSignal, TickDelta, TrackerEvent, TrackerHandle,
    TrackerState,
};
