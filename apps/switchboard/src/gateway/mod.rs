pub mod packet;
pub mod registry;
pub mod server;
pub mod transport;
