pub mod a2a;
pub mod analyze;
pub mod health;
