pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod profile;
pub mod repl;
pub mod replicate;
pub mod response;
pub mod shell;
pub mod storage;
