pub mod attendance;
pub mod billing;
pub mod certificates;
pub mod children;
pub mod error;
pub mod groups;
pub mod invoice_scheduler;
pub mod metrics;
pub mod qr;
pub mod receipt_extract;
pub mod receipt_parser;
pub mod receipts;
pub mod schedule;
