pub mod buffered;
pub mod cache;
pub mod core;
pub mod engine;
pub mod feed;
pub mod http;
pub mod mpv;
pub mod poll;
pub mod store;
