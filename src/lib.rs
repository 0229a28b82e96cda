pub mod capability;
pub mod config;
pub mod declarative;
pub mod filter;
pub mod orchestration;
pub mod provider;
pub mod sandbox;
pub mod shared;
pub mod template;
pub mod vector;
