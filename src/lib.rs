//! Incremental content loading for the deals feed and store search.
pub mod api;
pub mod cards;
pub mod config;
pub mod details;
pub mod dom;
pub mod fetcher;
pub mod model;
pub mod observer;
pub mod pipeline;
pub mod store_manager;
pub mod subscriptions;
pub mod toast;
