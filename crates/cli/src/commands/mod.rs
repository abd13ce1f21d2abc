pub mod init;
pub mod query;
pub mod serve;
pub mod tools;
