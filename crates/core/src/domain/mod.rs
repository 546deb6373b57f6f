pub mod screen;
pub mod stock;
