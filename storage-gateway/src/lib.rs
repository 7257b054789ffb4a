pub mod abi;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod metrics;
pub mod rpc;
pub mod wallet;
