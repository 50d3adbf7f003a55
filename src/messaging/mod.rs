/// Messaging module
///
/// Sound and instance lifecycle notifications, broadcast to any number of
/// subscribers over crossbeam channels.
///
/// ```rust,ignore
/// let (rx, _id) = library.events().subscribe();
/// library.play("boom", ());
/// library.update(1.0 / 60.0);
/// while let Ok(event) = rx.try_recv() {
///     match event {
///         SoundEvent::Ended { alias, .. } => { /* ... */ }
///         _ => {}
///     }
/// }
/// ```
pub mod bus;
pub mod events;

pub use bus::{EventBus, SubscriberId};
pub use events::SoundEvent;
