pub mod chart;
pub mod config;
pub mod generator;
pub mod logging;
pub mod pipeline;
pub mod queries;
pub mod report;
pub mod reporter;
pub mod schema;
pub mod stats;
pub mod store;
pub mod table;
pub mod vocabulary;
