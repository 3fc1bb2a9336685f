//! The fixed action-emission order shared by both config back-ends
//! (spec.md §4.5, property P6). Grounded on the `supported_actions` list in
//! the original Varnish renderer — `https_redirection` and `trailing_slash`
//! must run first because later actions operate on a path/scheme that those
//! two may have already rewritten.

use crate::rules::Actions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSlot {
    HttpsRedirection,
    TrailingSlash,
    SyntheticResponse,
    Redirect,
    HeaderSouthbound,
    ReqPath,
    Backend,
    HeaderNorthbound,
}

pub const ACTION_ORDER: [ActionSlot; 8] = [
    ActionSlot::HttpsRedirection,
    ActionSlot::TrailingSlash,
    ActionSlot::SyntheticResponse,
    ActionSlot::Redirect,
    ActionSlot::HeaderSouthbound,
    ActionSlot::ReqPath,
    ActionSlot::Backend,
    ActionSlot::HeaderNorthbound,
];

/// True if `actions` configures this slot at all; emitters use this to skip
/// slots with nothing to render while still walking them in fixed order.
pub fn is_set(actions: &Actions, slot: ActionSlot) -> bool {
    match slot {
        ActionSlot::HttpsRedirection => actions.https_redirection.unwrap_or(false),
        ActionSlot::TrailingSlash => actions.trailing_slash.is_some(),
        ActionSlot::SyntheticResponse => actions.synthetic_response.is_some(),
        ActionSlot::Redirect => actions.redirect.is_some(),
        ActionSlot::HeaderSouthbound => actions.header_southbound.is_some(),
        ActionSlot::ReqPath => actions.req_path.is_some(),
        ActionSlot::Backend => actions.backend.is_some(),
        ActionSlot::HeaderNorthbound => actions.header_northbound.is_some(),
    }
}
