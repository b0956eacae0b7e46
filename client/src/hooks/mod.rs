//! Hook-shaped entry points for views.
//!
//! Each hook is a value owned by the view that created it. Background work
//! it starts (invalidation watchers, polling, delayed resets) lives exactly
//! as long as that value.

pub mod subscription;
pub mod use_authentication;
pub mod use_batch_mutation;
pub mod use_entity_details;
pub mod use_entity_list;
pub mod use_jobs;
pub mod use_logout;
pub mod use_mutation;
pub mod use_windowed_list;

pub use subscription::{Query, TaskGuard};
pub use use_authentication::{current_user, login};
pub use use_batch_mutation::{
    BatchError, BatchLabel, BatchMutation, BatchState, Outcome,
    use_batch_mutation, use_create_identifications,
};
pub use use_entity_details::{DetailsState, EntityDetails, use_entity_details};
pub use use_entity_list::{EntityList, ListState, use_entity_list};
pub use use_jobs::use_jobs;
pub use use_logout::logout;
pub use use_mutation::{
    Mutation, MutationSpec, MutationState, MutationStatus, use_create_entity,
    use_delete_entity, use_entity_action, use_update_entity,
};
pub use use_windowed_list::{
    WindowState, WindowedList, use_session_captures, use_windowed_list,
};
