// Application layer - The dialog orchestration core
pub mod collaborators;
pub mod dialog_controller;
pub mod dialog_service;
pub mod token_manager;
