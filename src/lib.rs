// Library for tests to access modules

pub mod account_repo;
pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod cost_analyzer;
pub mod credentials;
pub mod db;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod routes;
pub mod rules;
pub mod run_repo;
pub mod scheduler;
