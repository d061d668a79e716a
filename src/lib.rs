pub mod download;
pub mod generator;
pub mod reference;
pub mod replicate;
