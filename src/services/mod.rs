pub mod catalog;
pub mod collector;
pub mod open_meteo;
pub mod poller;
pub mod risk;
