// Library for tests to access modules

pub mod config;
pub mod engine;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod sample_repo;
pub mod source;
pub mod writer;
