//! Orchestration layer of the forcedash dashboard client
//!
//! ## Key Components
//!
//! - **`http`**: the fetch primitive for chart, task status and results
//!   endpoints, behind the [`ChartSource`], [`StatusSource`] and
//!   [`ResultsSource`] seams.
//! - **`charts`**: chart images with revocable blob handles and the
//!   per-task chart cache that releases them.
//! - **`loader`**: [`BatchResourceLoader`], windowed concurrent chart loading
//!   with per-item deadlines and failure isolation.
//! - **`polling`**: [`PollingController`], the task status state machine.
//! - **`context`**: [`DashboardContext`], which owns the caches for one
//!   client session and hands out loaders and pollers.

pub mod charts;
pub mod context;
pub mod http;
pub mod loader;
pub mod polling;

pub use charts::{chart_catalog, BlobHandle, BlobRegistry, ChartCache, ChartImage, ChartMetadata};
pub use context::DashboardContext;
pub use http::{ChartSource, HttpClient, RawChart, ResultsSource, StatusSource};
pub use loader::{
    failure_message, BatchReport, BatchResourceLoader, ChartInfo, ChartStatus, LoadOptions,
    LoadOutcome, Progress,
};
pub use polling::{PollSettings, PollState, PollingController};
