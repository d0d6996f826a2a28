//! Download watcher library.
//!
//! Files finished downloading are classified by their name and moved into
//! the matching series folder of the anime or series library. Everything it
//! cannot file is renamed in place so it is not looked at again.

pub mod aliases;
pub mod commands;
pub mod error;
pub mod index;
pub mod notify;
pub mod parser;
pub mod relocation;
pub mod service;
pub mod watcher;

pub use aliases::{AliasEntry, AliasStore};
pub use commands::{execute, parse_command, Command, CommandError};
pub use error::{AliasStoreError, IndexError, RelocationError, WatcherError};
pub use index::DirectoryIndex;
pub use notify::{MemoryNotifier, Notifier, TracingNotifier};
pub use relocation::{RelocationSettings, EXCLUDED_MARKER, QUARANTINE_MARKER};
pub use service::WatcherService;
pub use watcher::{Watcher, WatcherHandle, WatcherSignal};
