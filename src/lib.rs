pub mod auth;
pub mod booking;
pub mod config;
pub mod engine;
pub mod http;
pub mod journal;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pricing;
pub mod reminder;
pub mod seed;
pub mod timeutil;
