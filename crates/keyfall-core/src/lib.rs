pub mod audio_graph;
pub mod audio_params;
pub mod engine;
pub mod error;
pub mod input_router;
pub mod ipc;
pub mod layout;
pub mod memory;
pub mod piano;
pub mod playback;
pub mod raster;
pub mod rhythm;
pub mod score_card;
pub mod scroll;
pub mod theme;
pub mod timers;
pub mod transport;

pub use audio_graph::*;
pub use audio_params::*;
pub use engine::*;
pub use error::*;
pub use input_router::*;
pub use ipc::*;
pub use layout::*;
pub use memory::*;
pub use piano::*;
pub use playback::*;
pub use raster::*;
pub use rhythm::*;
pub use score_card::*;
pub use scroll::*;
pub use theme::*;
pub use timers::*;
pub use transport::*;
