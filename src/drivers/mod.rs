//! Input classification and LED animation drivers.

pub mod button;
pub mod led_patterns;
