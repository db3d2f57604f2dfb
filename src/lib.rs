// Library surface for the binary, headless integration tests and reuse.
// Terminal rendering stays in the binary.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod history;
pub mod input;
pub mod layout;
pub mod logging;
pub mod machine;
pub mod runtime;
pub mod session;
pub mod shape;
pub mod util;
