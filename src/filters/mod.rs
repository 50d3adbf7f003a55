/// Filters module
///
/// The base [`Filter`] handle, the [`Filterable`] splice that routes a fixed
/// input through an ordered filter list into a fixed output, and a small
/// catalog of ready-made stages.
pub mod distortion;
pub mod equalizer;
pub mod filter;
pub mod filterable;
pub mod reverb;
pub mod stereo;
pub mod telephone;

pub use distortion::DistortionFilter;
pub use equalizer::EqualizerFilter;
pub use filter::Filter;
pub use filterable::Filterable;
pub use reverb::ReverbFilter;
pub use stereo::StereoFilter;
pub use telephone::telephone_filter;
