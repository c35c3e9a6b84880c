pub mod database;
pub mod queries;
pub mod repositories;
pub(crate) mod rows;
