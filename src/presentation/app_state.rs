// Application state for HTTP handlers
use crate::application::dialog_service::DialogService;

#[derive(Clone)]
pub struct AppState {
    pub dialogs: DialogService,
}
