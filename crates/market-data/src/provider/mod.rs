//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` trait the service drives for outbound fetches
//! - The Alpha Vantage implementation
//! - Synthetic placeholder generation used when no data can be fetched
//!
//! Providers are stateless with respect to caching and rate limiting: the
//! service consults the limiter before every call and owns the store.

mod traits;

pub mod alpha_vantage;
pub mod synthetic;

pub use traits::QuoteProvider;
