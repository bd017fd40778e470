pub mod digest;
pub mod fixed_str;
pub mod fs_size_calculator;
pub mod time_util;
pub mod traits;
