//! Rule evaluation: match strategies, compiled tests, and the builtin
//! rule catalog.

pub mod builtin;
pub mod failure;
pub mod fragment;
pub mod function_length;
pub mod strategy;
pub mod test;

pub use failure::Failure;
pub use fragment::SecondPassFragment;
pub use function_length::FunctionSpan;
pub use strategy::MatchStrategy;
pub use test::RatchetTest;
