//! Reader page markup the pipeline depends on.

/// First-visit guidance overlay; clicking dismisses it.
pub const GUIDE_OVERLAY: &str = ".e_tip";
/// Bookmark control that opens the registration/login dialog.
pub const BOOKMARK_TRIGGER: &str = ".page-m-mark";
/// Buttons inside reader dialogs.
pub const DIALOG_BUTTON: &str = ".fui-button";
/// Label of the dialog button that proceeds to login.
pub const CONFIRM_LABEL: &str = "确定";
/// Progress indicator, text `current/total`.
pub const PROGRESS_INDICATOR: &str = ".perc";
/// Document title.
pub const TITLE: &str = ".e_title span";
/// Warning shown for documents the account has not purchased.
pub const PAID_CONTENT_WARNING: &str = "#readWarn";

/// Container of 1-based page `page`.
#[must_use]
pub fn page_container(page: u32) -> String {
    format!("#pageImgBox{page}")
}

/// Rendered image inside the container of page `page`.
#[must_use]
pub fn page_image(page: u32) -> String {
    format!("#pageImgBox{page} uni-view.page-lmg img")
}
