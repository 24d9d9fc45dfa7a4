// Library for tests to access modules

pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod reconciler;
pub mod registry;
pub mod routes;
pub mod sink;
pub mod source;
pub mod version;
