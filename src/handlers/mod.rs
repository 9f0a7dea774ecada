mod health;
mod submissions;

pub use health::health_check;
pub use submissions::{method_not_allowed, not_found, submit};
