use crate::error::Result;
use crate::models::{ActiveMachine, Page};
use crate::resolve::EntityKind;

/// A paginated listing that names can be searched in.
///
/// Implemented by the API modules over their listing endpoints and by in-memory
/// fakes in tests.
pub trait PageSource {
    /// Entity kind listed by this source; used in resolution errors.
    fn kind(&self) -> EntityKind;

    /// Fetch one page (1-based) of at most `per_page` entries.
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Page>;
}

/// Something whose spawn status can be observed by ID.
pub trait StatusSource {
    /// Current status of `id`, or `None` when nothing is active for it yet.
    async fn fetch_status(&self, id: u64) -> Result<Option<ActiveMachine>>;
}
