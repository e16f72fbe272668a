//! SDMX RESTful web sources.
//!
//! A [`RestClient`] speaks one dialect over an [`HttpClient`](crate::HttpClient);
//! the web driver stacks [`CachedWebClient`] and [`FailsafeWebClient`] on top
//! and exposes the result as a [`WebConnection`].

pub mod cached;
pub mod client;
pub mod connection;
pub mod driver;
pub mod failsafe;
pub mod queries;
pub mod query;
pub mod rest;

pub use cached::CachedWebClient;
pub use client::WebClient;
pub use connection::WebConnection;
pub use driver::WebDriver;
pub use failsafe::FailsafeWebClient;
pub use query::RestQueryBuilder;
pub use rest::{RestClient, RestDialect};
