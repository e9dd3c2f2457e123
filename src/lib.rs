pub mod app;
pub mod catalog;
pub mod columnar;
pub mod config;
pub mod deg;
pub mod domain;
pub mod enrichr;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pathways;
pub mod store;
pub mod table;
pub mod verify;
