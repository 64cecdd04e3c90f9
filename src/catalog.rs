//! The catalog is the authoritative, displayable listing of models per
//! backend, and the home of model resolution. The hosted backends carry
//! curated literal entries; the local backend's entries are discovered
//! from the running daemon exactly once, during startup population, and
//! the catalog is read-only from then on.
//!
//! Resolution maps a model identifier to the backend tag that declares
//! it: backends are scanned in [`BackendId`] declaration order and
//! entries in listed order, and the first exact match wins. Nothing
//! prevents two backends from declaring the same identifier; when that
//! happens the earlier backend wins silently, which callers should treat
//! as an accident of ordering rather than a tie-break to rely on.
//!
//! [`BackendId`]: crate::backends::backends::BackendId

pub(crate) mod catalog;
pub(crate) mod populate;
