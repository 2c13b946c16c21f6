// Smartmarks services
// Services run on the server side of the page: mutation actions and page composition.

pub mod actions;
pub mod page;
