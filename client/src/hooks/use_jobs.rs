use payloads::FetchSpecification;

use super::{EntityList, use_entity_list};
use crate::ClientContext;
use crate::models::Job;

pub fn use_jobs(
    ctx: &ClientContext,
    spec: FetchSpecification,
) -> EntityList<Job> {
    use_entity_list(ctx, spec)
}

impl EntityList<Job> {
    /// Poll exactly while some job on the current page is still running.
    /// Returns whether polling is now on.
    pub fn sync_polling(&mut self) -> bool {
        let active = self.state().items().iter().any(Job::is_in_progress);
        self.set_poll(active);
        active
    }
}
