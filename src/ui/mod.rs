//! UI components for the simulator shell

pub mod device_screen;
pub mod editor;
pub mod input_dialog;
pub mod inspector;
pub mod keyboard;
pub mod layout;
pub mod statusbar;
pub mod textfield;
pub mod widget;

pub use editor::EditorView;
pub use layout::app_layout;
pub use statusbar::{StatusBar, Toolbar};
