pub mod capital_stack;
pub mod dscr;
