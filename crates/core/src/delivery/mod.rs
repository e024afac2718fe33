pub mod chunker;
pub mod timing;
