pub mod account;
pub mod external_device_conn;
pub mod firewall;
pub mod firewall_tag;
pub mod spoke_gateway;
pub mod spoke_transit_attachment;
pub mod transit_gateway;
pub mod util;
