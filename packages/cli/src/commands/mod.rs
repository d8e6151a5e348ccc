pub mod database;
pub mod databases;
pub mod discovery;
pub mod instances;
pub mod login;
pub mod systems;
