pub mod cursor;
pub mod model;
pub mod toggle;
pub mod util;
