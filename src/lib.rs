pub mod bounds;
pub mod color;
pub mod config;
pub mod error;
pub mod index;
pub mod interp;
pub mod mesh;
pub mod normal_cast;
pub mod pipeline;
pub mod plugin;
pub mod progress;
pub mod rainfall;
pub mod types;

pub use pipeline::{ThicknessMap, map_thickness};
pub use plugin::BoneThicknessPlugin;
