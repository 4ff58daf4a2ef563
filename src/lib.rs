// lib.rs
pub mod classify;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod reconcile;
pub mod report;
pub mod variant;
pub mod vcf;
pub mod writer;
