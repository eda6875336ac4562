// Library exports for extralign
pub mod bundle;
pub mod expand;
pub mod genome;
pub mod hits;
pub mod library;
pub mod pipeline;
pub mod ranking;
pub mod tools;
