pub mod cli;
pub mod config;
pub mod ingress;
pub mod partition;
pub mod payload;
pub mod replica;
pub mod status;
pub mod transport;
pub mod worker;
