pub mod close;
pub mod cursor;
pub mod source;
