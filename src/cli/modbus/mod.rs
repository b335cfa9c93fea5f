pub mod slave;

pub use slave::{serve, serve_port};
