/// Media-element backend
///
/// Models a plain audio element: no node graph, a playhead driven by the
/// context clock, and no filter support. With the `rodio-output` feature each
/// instance also drives a real output sink.
mod instance;
mod media;
#[cfg(feature = "rodio-output")]
mod output;

pub use instance::ElementInstance;
pub use media::ElementMedia;
#[cfg(feature = "rodio-output")]
pub use output::ElementOutput;
