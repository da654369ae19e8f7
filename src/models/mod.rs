pub mod attendance;
pub mod auth;
pub mod certificate;
pub mod child;
pub mod group;
pub mod payment;
pub mod schedule;
pub mod user;
