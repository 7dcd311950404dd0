// Here's the list of the FTP commands implemented
pub mod auth;
pub mod feat;
pub mod handlers;
pub mod noop;
pub mod pass;
pub mod quit;
pub mod rest;
pub mod retr;
pub mod stor;
pub mod syst;
pub mod type_;
pub mod user;

// Command parsing
pub mod ftpcommand;
