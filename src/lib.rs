pub mod biostudies;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod filetypes;
pub mod http;
pub mod output;
pub mod remote_zip;
pub mod resolver;
pub mod rollup;
pub mod splitter;
pub mod store;
pub mod study;
pub mod summary;
pub mod zip_index;
