pub mod ast;
pub mod capture;
pub mod commands;
pub mod completion;
pub mod context;
pub mod executor;
pub mod instance;
pub mod parser;
pub mod pipeline;

pub use executor::Interpreter;

#[cfg(test)]
mod tests;
