mod store_file;
mod store_memory;
mod transport_fake;
mod transport_reqwest;

pub use store_file::*;
pub use store_memory::*;
pub use transport_fake::*;
pub use transport_reqwest::*;
