//! Side panels

mod hierarchy;
mod joints;

pub use hierarchy::HierarchyPanel;
pub use joints::JointsPanel;

use crate::viewer::ViewerState;

/// A panel drawn into a side area of the window
pub trait Panel {
    fn name(&self) -> &str;

    fn ui(&mut self, ui: &mut egui::Ui, viewer: &mut ViewerState);
}
