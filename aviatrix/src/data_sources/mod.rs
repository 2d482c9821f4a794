pub mod account;
pub mod spoke_gateway;
pub mod transit_gateway;
