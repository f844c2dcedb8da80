pub mod config;
pub mod constants;
pub mod controller;
pub mod event;
pub mod hub;
pub mod model;
pub mod session;
pub mod validation;
