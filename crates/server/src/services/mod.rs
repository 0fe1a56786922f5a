pub mod analyst;
pub mod coach;
