pub mod html;
#[cfg(feature = "telegram")]
pub mod telegram;
pub mod traits;

pub use html::{escape_html, html_to_plain, meme_caption};
#[cfg(feature = "telegram")]
pub use telegram::{TelegramChannel, TelegramSender};
pub use traits::{
    ChannelLifecycle, ChannelStatus, ChatEventHandler, DeliverySink, OutboundPhoto, OutboundText,
};
