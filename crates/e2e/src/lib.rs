//! Conduit E2E scenario runner
//!
//! Scenarios are declarative YAML files combining the pieces the
//! `conduit-harness` crate provides:
//!
//! ```text
//! name: mocked-feed
//! session: none | direct | ui
//! routes:
//!   - pattern: "**/api/tags"
//!     mock: { fixture: tags }
//!   - pattern: "**/api/articles**"
//!     transform:
//!       - { pointer: /articles/0/title, value: Mocked Title }
//! setup:
//!   - action: create_article
//!     title: ...
//! steps:
//!   - action: navigate
//!     path: /
//!   - action: expect_text
//!     selector: app-article-list h1
//!     contains: Mocked Title
//! cleanup:
//!   - action: delete_created_articles
//! ```
//!
//! The runner provisions a session once, compiles the routes against the
//! fixture store, drives the browser, and tears down API-side state even
//! when a step fails.

pub mod error;
pub mod runner;
pub mod scenario;

pub use error::{E2eError, E2eResult};
pub use runner::{RunnerConfig, ScenarioRunner, SuiteResult};
pub use scenario::{ScenarioSpec, SessionMode};
