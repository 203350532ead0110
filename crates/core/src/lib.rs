pub mod camera;
pub mod enrollment;
pub mod persons;
pub mod recognition;
pub mod service;
pub mod shared;
pub mod staging;
pub mod training;
pub mod workers;
