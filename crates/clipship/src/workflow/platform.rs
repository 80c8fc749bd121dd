//! URLs and selectors for the creator platform's upload surfaces.
//!
//! The composer is a client-rendered app whose class names are partially
//! hashed; selectors anchor on the stable prefixes and on visible labels.

pub const HOME_URL: &str = "https://creator.douyin.com/";
pub const UPLOAD_URL: &str = "https://creator.douyin.com/creator-micro/content/upload";

/// The two known post-upload composer surfaces; either counts as "ready".
pub const COMPOSER_URL_V1: &str = "https://creator.douyin.com/creator-micro/content/publish";
pub const COMPOSER_URL_V2: &str = "https://creator.douyin.com/creator-micro/content/post/video";

/// Landing surface after a successful publish.
pub const MANAGE_URL_PREFIX: &str = "https://creator.douyin.com/creator-micro/content/manage";

/// Visible on the login wall when the session is not authenticated.
pub const LOGIN_PROMPT_XPATH: &str =
    "//*[contains(text(),'手机号登录') or contains(text(),'扫码登录')]";

/// File input of the initial upload surface.
pub const FILE_INPUT_CSS: &str = "div[class^='container'] input";

/// Title field on the composer; newer builds render a dedicated input,
/// older ones a contenteditable area.
pub const TITLE_INPUT_XPATH: &str =
    "//*[text()='作品标题']/../following-sibling::div[1]//input";
pub const TITLE_EDITOR_CSS: &str = ".notranslate";

/// Topic tag editor.
pub const TOPIC_EDITOR_CSS: &str = ".zone-container";

/// Rendered once the binary upload completed.
pub const UPLOAD_DONE_XPATH: &str =
    "//*[starts-with(@class,'long-card')]//div[contains(text(),'重新上传')]";
/// Rendered when the binary upload failed and should be resubmitted.
pub const UPLOAD_FAILED_XPATH: &str =
    "//div[contains(@class,'progress-div')]/div[contains(text(),'上传失败')]";
pub const REUPLOAD_INPUT_CSS: &str = "div.progress-div [class^='upload-btn-input']";

// Cover picker dialog.
pub const THUMBNAIL_OPEN_XPATH: &str = "//*[text()='选择封面']";
pub const THUMBNAIL_MODAL_CSS: &str = "div.semi-modal-content";
pub const THUMBNAIL_VERTICAL_XPATH: &str = "//*[text()='设置竖封面']";
pub const THUMBNAIL_UPLOAD_INPUT_CSS: &str =
    "div[class^='semi-upload upload'] input.semi-upload-hidden-input";
pub const THUMBNAIL_FINISH_XPATH: &str =
    "//div[starts-with(@class,'extractFooter')]//button[contains(.,'完成')]";

// Product attachment ("extended info" card → tag row → cart mode).
pub const EXTENSION_HEADING_XPATH: &str = "//*[normalize-space()='扩展信息']";
pub const TAG_ROW_XPATH: &str =
    "//div[contains(@class,'semi-form-field')][.//*[contains(normalize-space(),'添加标签')]]";
pub const TYPE_SELECT_CSS: &str = ".semi-select";
pub const CART_OPTION_XPATH: &str =
    "//*[@role='listbox']//*[@role='option'][contains(.,'购物车')]";
pub const CART_LABEL: &str = "购物车";
pub const LINK_INPUT_CSS: &str =
    "#douyin_creator_pc_anchor_jump input, #douyin_creator_pc_anchor_jump textarea";
pub const ADD_LINK_XPATH: &str = ".//*[contains(normalize-space(),'添加链接')]";

/// The item-edit dialog that confirms the link was accepted.
pub const PRODUCT_DIALOG_XPATH: &str =
    "//div[contains(@class,'semi-modal-wrap')][contains(.,'编辑商品')]";
/// The quota-exhausted notice; its appearance hard-aborts the job.
pub const QUOTA_NOTICE_XPATH: &str = "//*[contains(text(),'额度已满')]";
pub const SHORT_TITLE_INPUT_XPATH: &str =
    ".//input[contains(@placeholder,'短标题')] | .//textarea[contains(@placeholder,'短标题')]";
pub const DIALOG_FINISH_XPATH: &str = ".//button[contains(.,'完成')]";

/// Any blocking modal; must be gone before scheduling.
pub const MODAL_WRAP_CSS: &str = ".semi-portal .semi-modal-wrap";
/// Button labels tried, in order, to dismiss a lingering modal.
pub const MODAL_DISMISS_LABELS: &[&str] = &["完成编辑", "完成", "取消", "关闭"];

// Scheduling.
pub const SCHEDULE_RADIO_XPATH: &str =
    "//*[starts-with(@class,'radio')][contains(.,'定时发布')]";
pub const SCHEDULE_INPUT_CSS: &str = ".semi-input[placeholder='日期和时间']";
pub const SCHEDULE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// Third-party syndication switch.
pub const SYNDICATION_SWITCH_CSS: &str =
    "[class^='info'] > [class^='first-part'] div div.semi-switch";
pub const SYNDICATION_CHECKED_CLASS: &str = "semi-switch-checked";
pub const SYNDICATION_TOGGLE_CSS: &str = "input.semi-switch-native-control";

pub const PUBLISH_BUTTON_XPATH: &str = "//button[normalize-space()='发布']";
