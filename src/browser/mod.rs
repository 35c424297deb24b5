pub mod session;

pub use session::TwitterSession;
