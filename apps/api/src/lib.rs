pub mod checkin;
pub mod config;
pub mod db;
pub mod errors;
pub mod judging;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod store;
pub mod teammates;
