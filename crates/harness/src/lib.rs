//! Conduit test harness
//!
//! This crate provides the building blocks the E2E suites are written
//! with:
//! - Provisions sessions against the Conduit API, through the login form
//!   or the login endpoint, and persists them as storage-state snapshots
//! - Intercepts page traffic with glob-matched route rules that mock or
//!   mutate API responses
//! - Drives a real browser by compiling typed steps into a Playwright
//!   script run under `node`
//! - Issues direct HTTP calls through typed API clients
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Test case (Rust)                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  SessionProvisioner                                          │
//! │    ├── provision(UiLogin | DirectLogin) -> SessionCredential │
//! │    └── provision_into(path)  // partial token update         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  RouteTable                                                  │
//! │    ├── intercept("**/api/tags", Mock { .. })                 │
//! │    ├── intercept("**/api/articles**", Transform { .. })      │
//! │    └── dispatch(req) -> Fulfill(..) | Passthrough            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  PageHandle                                                  │
//! │    ├── with_routes(table)   // compiled into page.route(..)  │
//! │    ├── load/save storage state                               │
//! │    └── run(steps) -> PageRun { captures }                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ConduitClient / PlaceholderClient                           │
//! │    └── login, articles CRUD, tags, posts                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod fixture;
pub mod page;
pub mod pattern;
pub mod route;
pub mod session;
pub mod storage;

pub use api::{ConduitClient, PlaceholderClient};
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use fixture::FixtureStore;
pub use page::{PageHandle, PageStep};
pub use pattern::RoutePattern;
pub use route::{Disposition, InterceptMode, RouteTable};
pub use session::{DirectLogin, LoginStrategy, SessionCredential, SessionProvisioner, UiLogin};
pub use storage::StorageState;
