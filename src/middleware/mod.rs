pub mod action_id;

pub use action_id::{
    action_id_middleware, action_kind, make_span_with_action_id, ActionId, ACTION_ID_HEADER,
};
