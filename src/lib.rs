pub mod capture;
pub mod command;
pub mod config;
pub mod mode;
pub mod network;
pub mod oui;
pub mod radio;
pub mod recorder;
pub mod server;
