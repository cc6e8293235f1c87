#[cfg(debug_assertions)]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[cfg(not(debug_assertions))]
#[global_allocator]
static A: rlsf::GlobalTlsf = rlsf::GlobalTlsf::new();

mod config;
mod control;
mod engine;
mod error;
mod feedback;
#[cfg(feature = "live")]
mod live;
mod params;
mod routes;
mod shape;
mod smoothing;
mod snapshot;
#[cfg(feature = "wav")]
mod wav;

pub use config::*;
pub use control::*;
pub use engine::*;
pub use error::*;
pub use feedback::*;
#[cfg(feature = "live")]
pub use live::*;
pub use params::*;
pub use routes::*;
pub use shape::*;
pub use smoothing::*;
pub use snapshot::*;
#[cfg(feature = "wav")]
pub use wav::*;
