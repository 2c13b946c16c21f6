// Smartmarks state managers
// Managers own client-side state: the live bookmark list, the add form, and the session controls.

pub mod add_form;
pub mod bookmark_list;
pub mod list_controller;
pub mod session_controls;
