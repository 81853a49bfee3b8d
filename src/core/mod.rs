// Core modules: wire commands, native seam, result layout, scoped release, orchestration.
pub mod boundary;
pub mod command;
pub mod error;
pub mod handle;
pub mod layout;
pub mod native;
pub mod outcome;
