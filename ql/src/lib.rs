pub mod learn;
pub mod log;
pub mod prelude;
pub mod util;
