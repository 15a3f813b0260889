pub mod agents;
pub mod api;
pub mod config;
pub mod data_models;
pub mod db;
pub mod genai;
pub mod reference;
pub mod score;
pub mod workflow;
