// Adapters layer: concrete implementations for the registry API, file
// storage, spreadsheet output and email.

pub mod http;
pub mod mail;
pub mod storage;
pub mod xlsx;
