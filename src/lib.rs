pub mod classify;
pub mod correlation;
pub mod db;
pub mod directory;
pub mod error;
pub mod fees;
pub mod fmt;
pub mod keys;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod router;
pub mod settings;
