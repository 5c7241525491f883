//! Drivers shipped with the crate. Others plug in through
//! [`DriverRegistry::register`](crate::DriverRegistry::register).

#[cfg(feature = "postgres")]
pub mod postgres;
