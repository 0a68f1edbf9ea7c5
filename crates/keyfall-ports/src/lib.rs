pub mod audio;
pub mod midi;
pub mod render;
pub mod sampler;
pub mod settings;
pub mod types;

pub use audio::*;
pub use midi::*;
pub use render::*;
pub use sampler::*;
pub use settings::*;
pub use types::*;
