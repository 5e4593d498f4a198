//! Pipeline stages for downloading and reassembling scrambled pages.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own: the tile math never touches the network, and the fetcher never
//! touches pixels.
//!
//! ## Data Flow
//!
//! ```text
//! transport ──▶ fetch ──▶ decode ──▶ deobfuscate ──▶ persist
//!  (reqwest)   (retries)  (image)   (4x4 transpose)   (NNN.png)
//! ```
//!
//! 1. [`transport`] — one HTTP GET with the viewer's headers and cookies
//! 2. [`fetch`]     — bounded exponential retries, plus the supervisory loop
//!    that rebuilds the client after a timeout
//! 3. [`decode`]    — bytes to RGBA, checked against the declared page size
//! 4. [`deobfuscate`] — undo the tile transposition and refill the margins
//! 5. [`persist`]   — atomic PNG write
//!
//! [`page`] drives the five steps for a single page.

pub mod decode;
pub mod deobfuscate;
pub mod fetch;
pub mod page;
pub mod persist;
pub mod transport;
