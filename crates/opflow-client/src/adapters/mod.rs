//! [`OpenPaymentsApi`](crate::traits::OpenPaymentsApi) implementations.

pub mod http;
pub mod sandbox;
