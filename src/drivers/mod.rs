pub mod imu;
pub mod sim;
