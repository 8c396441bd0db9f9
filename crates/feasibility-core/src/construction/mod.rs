pub mod drawdown;
pub mod interest;
