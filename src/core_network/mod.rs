pub mod network;
pub mod pasv;
pub mod port;
