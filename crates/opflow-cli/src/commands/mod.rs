pub mod flow;
pub mod init;
pub mod keygen;
pub mod payments;
pub mod send;
pub mod wallet;
