pub mod attendance;
pub mod certificates;
pub mod children;
pub mod groups;
pub mod health;
pub mod metrics;
pub mod payments;
pub mod schedule;
