pub mod classify;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod table;
