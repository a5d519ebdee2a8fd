/// The rendering host that presents the consent form.
///
/// A surface reports user activity by passing `consent://` event URLs to
/// [`ConsentForm::handle_url`](super::ConsentForm::handle_url), may do so from
/// inside any of these calls, and reports finished page loads and rendering
/// failures through the form's `on_page_finished` and `on_load_error`.
pub trait PresentationSurface: Send + Sync {
    /// Begin loading the form content from `resource`.
    fn load(&self, resource: &str);
    /// Run a script command inside the loaded content.
    fn execute(&self, command: &str);
    /// Display the surface. Returns whether it is showing afterwards.
    fn show(&self) -> bool;
    fn dismiss(&self);
    fn is_showing(&self) -> bool;
    /// Hand `url` to an external browser. Returns false when nothing can open it.
    fn open_browser(&self, url: &str) -> bool;
}
