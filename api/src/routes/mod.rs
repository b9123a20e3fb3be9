pub mod a2a;
pub mod agent_card;
pub mod analyze;
pub mod health;
