pub mod transport_interface;
