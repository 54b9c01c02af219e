pub mod audit;
pub mod credentials;
pub mod error;
pub mod publisher;
pub mod session;
#[cfg(test)]
pub mod testing;
pub mod twitter;
