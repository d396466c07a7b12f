mod csrf;
mod request;
mod session;
mod user;

pub use csrf::*;
pub use request::*;
pub use session::*;
pub use user::*;
