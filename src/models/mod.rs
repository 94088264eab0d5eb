pub mod access;
pub mod group;
pub mod user;
