pub use tracing;
pub use tracing_subscriber;
pub mod lib {
    pub mod calculator;
    pub mod config;
    pub mod field;
    pub mod generator;
    pub mod loader;
    pub mod notice;
    pub mod prebuilt;
    pub mod routine;
    pub mod service;
    pub mod session;
}
