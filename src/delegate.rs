//! Host callbacks raised by the engine

use crate::layout::NodeId;

/// Receiver for re-layout requests
///
/// Calls always happen on the thread that owns the layout state.
pub trait TemplateDelegate: Send + Sync {
    /// An image finished loading and changed the size of `node`
    fn did_finish_loading_image(&self, node: NodeId);

    /// A template became available (or failed for good); the host should
    /// re-render the message that asked for it
    fn need_reload_cell(&self);
}
