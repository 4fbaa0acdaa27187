//! YAML configuration documents: seeding defaults, service/cache definitions
//! and the seed tasks themselves.

mod proxy;
pub use proxy::*;

mod seed_conf;
pub use seed_conf::*;

mod services;
pub use services::*;
