pub mod analyze;
pub mod coach;
pub mod health;
pub mod voice;
