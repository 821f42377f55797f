pub mod color;
pub mod row;
pub mod shared_str;

pub use color::{Hsv, Rgb};
pub use row::{CallRow, CallTreeView, format_seconds};
pub use shared_str::SharedStr;
