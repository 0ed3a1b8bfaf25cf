//! Bender - build-version resolution and scaffold assembly for static assets
//!
//! Pages reference bundles by pointer-style paths like
//! `navbar/static/js/navbar.js`; bender resolves which built version
//! (`static-<major>.<minor>`) of each project to serve, fetches the built
//! include HTML from the artifact store or a local development daemon, and
//! assembles it into a scaffold of head CSS, head JS and footer JS.

pub mod assets;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod manifest;
pub mod resolver;
pub mod scaffold;
pub mod version;

pub use assets::{BenderAssets, BenderContext};
pub use error::{BenderError, BenderResult};
pub use scaffold::Scaffold;
