pub mod config;
pub mod plugins;
pub mod security;
pub mod storage;
pub mod validation;
pub mod xds;
