//! Reading a quote's news page.
//!
//! The page is driven through a [`PageDriver`](crate::driver::PageDriver)
//! and parsed in three layers:
//!
//! | Layer | Module | Job |
//! |-------|--------|-----|
//! | Candidates | [`selectors`] | Ordered selector strategies that find story nodes |
//! | Items | [`extract`] | One story node to one [`NewsItem`](crate::models::NewsItem) |
//! | Session | [`session`] | Load, consent, wait, scroll and collect for one ticker |
//!
//! Markup changes on the site should only ever need edits in [`selectors`]
//! and [`extract`], or in the selectors carried by the config.

pub mod extract;
pub mod selectors;
pub mod session;
