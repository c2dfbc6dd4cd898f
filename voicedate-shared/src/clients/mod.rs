pub mod rabbitmq;
pub mod redis;
