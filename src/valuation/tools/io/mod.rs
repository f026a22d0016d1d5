pub mod addresses;
pub mod client;
pub mod deep_search;
pub mod table;
