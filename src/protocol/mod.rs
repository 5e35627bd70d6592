pub mod adalight;

pub use adalight::build_adalight_frame;
