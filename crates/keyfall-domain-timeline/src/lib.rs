pub mod beatmap;
pub mod midi_import;
pub mod model;
pub mod tempo;

pub use beatmap::*;
pub use midi_import::*;
pub use model::*;
pub use tempo::*;
