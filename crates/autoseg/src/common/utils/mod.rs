pub mod fs;
pub mod num;
pub mod str;
pub mod time;
