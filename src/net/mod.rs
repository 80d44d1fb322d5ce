pub mod bridge;
pub mod http;
pub mod publish;
