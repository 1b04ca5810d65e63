pub mod chat;
pub mod context;
pub mod followup;
pub mod interaction;
pub mod knowledge;
pub mod lead;
pub mod pending;
pub mod power_hour;
pub mod preference;
pub mod usage;
pub mod user;
