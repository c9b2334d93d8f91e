//! Invoicing Service - invoice numbering, VAT totals and status lifecycle.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod startup;
