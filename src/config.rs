use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        mongo_uri: get_env("MONGO_URI"),
        mongo_db_name: get_env_or_default("MONGO_DB_NAME", "tripsmith"),
        gemini_api_key: get_env("GEMINI_API_KEY"),
        gemini_model: get_env_or_default("GEMINI_MODEL", "gemini-2.0-flash"),
        gemini_base_url: get_env_or_default(
            "GEMINI_BASE_URL",
            "https://generativelanguage.googleapis.com",
        ),
        bind_addr: get_env_or_default("BIND_ADDR", "0.0.0.0:3000"),
    }
});

pub struct Config {
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub bind_addr: String,
}

fn get_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("Missing required environment variable: {key}"))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
