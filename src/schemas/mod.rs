pub mod answer;
pub mod attempt;
pub mod evaluation;
pub mod exam;
pub mod user;
