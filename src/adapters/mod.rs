pub mod h2o;
pub mod output;
pub mod server;
pub mod transport;
