//! Command implementations that do not need an open repository.

pub mod init;
