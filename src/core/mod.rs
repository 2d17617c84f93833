//! Core components: prompt assembly, the streaming generation controller,
//! toolbar synchronization, and the export pipeline.

pub mod export;
pub mod prompt;
pub mod session;
pub mod toolbar;
