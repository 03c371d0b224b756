//! Main module for the pika engine

pub mod combinators;
pub mod matchers;
pub mod packrat;
pub mod parser;
pub mod result;
pub mod scanner;
pub mod session;
pub mod tokens;
