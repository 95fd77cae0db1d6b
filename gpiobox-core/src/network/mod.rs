pub mod connection;

pub use connection::{Connector, Endpoint, LINK_CAPACITY, Link, WsConnector};
