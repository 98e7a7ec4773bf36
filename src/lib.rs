//! Market insight client core.
//!
//! A session seeds its history from the bulk insight listing, prepends every
//! ad-hoc headline analysis, and republishes a confidence trend after each
//! change. The remote inference service sits behind [`gateway::AnalysisGateway`].

pub mod config;
pub mod gateway;
pub mod insight;
pub mod logging;
pub mod session;
pub mod store;
pub mod trend;

pub use config::{Config, ResponseOrdering};
pub use gateway::{AnalysisGateway, GatewayError, HttpGateway};
pub use insight::Insight;
pub use session::{InsightSession, SessionError, SessionSnapshot, Ticket};
pub use store::InsightStore;
pub use trend::{project, ChartSeries};
