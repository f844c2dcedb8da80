//! Terminal side of the session.
//!
//! - [`surface`]: the `Renderer`/`Surface` contracts the controller renders through.
//! - [`terminal`]: the raw-mode implementation with interleaved prompt redraws.
//! - [`pager`]: long listings through `$PAGER`.
//! - [`driver`]: the loop tying controller, surface and transport together.

pub mod driver;
pub mod pager;
pub mod surface;
pub mod terminal;
