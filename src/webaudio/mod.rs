/// Graph-backed backend: media template chains and cloned play instances
mod instance;
mod media;

pub use instance::WebAudioInstance;
pub use media::{ChainLink, NodeChain, WebAudioMedia};
