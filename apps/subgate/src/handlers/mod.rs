pub mod health;
pub mod list;
pub mod subscription;
pub mod traffic;
