pub mod collect;
pub mod config;
pub mod metric;
pub mod paths;
pub mod ranked;
pub mod series;
pub mod snapshot;
pub mod table;
