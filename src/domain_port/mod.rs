mod key_value_store;
mod transport;

pub use key_value_store::*;
pub use transport::*;
