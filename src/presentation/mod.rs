// Presentation layer - JSON surface the hosting dashboard drives dialogs through
pub mod app_state;
pub mod handlers;
