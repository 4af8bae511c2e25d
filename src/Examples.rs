//! Worked simulations, selected by task number from `main`.
pub mod popbal_examples;
