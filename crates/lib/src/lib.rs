//! fbtools-lib: single-file compilation and build coordination for FASTBuild solutions
//!
//! The crate is organised leaves first:
//! - `bff`: locate a target in a build description, rewrite it into a
//!   single-file target, and synthesize the transient config around it
//! - `launcher`: read the launcher script and build command lines
//! - `process`: run external builds, one per channel, with output streaming
//! - `lifecycle`: track builds and run follow-up actions after successful ones
//! - `engine`: compose the above into compile, selection and debug requests
//! - `adapter`: connect host callbacks and commands to the engine

pub mod adapter;
pub mod bff;
pub mod consts;
pub mod engine;
pub mod host;
pub mod launcher;
pub mod lifecycle;
pub mod process;
pub mod settings;

#[cfg(all(test, unix))]
pub(crate) mod testutil;
