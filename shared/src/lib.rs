pub mod codec;
pub mod env;
pub mod graphics;
pub mod logger;
pub mod models;
pub mod networking;
