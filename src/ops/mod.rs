pub mod print;
pub mod text;
