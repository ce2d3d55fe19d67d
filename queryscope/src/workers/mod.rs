pub mod literal;
pub mod sessionizer;
pub mod timing;
