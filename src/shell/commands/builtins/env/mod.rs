pub mod cd;
pub mod exit;
pub mod export;
