mod access;
mod category;
mod models;

pub use access::AccessLevel;
pub use category::CategoryTemplate;
pub use models::*;
