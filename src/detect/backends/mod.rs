mod scripted;
#[cfg(feature = "backend-tract")]
mod tract;

pub use scripted::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
