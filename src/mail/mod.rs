//! 发信管线：地址校验 -> MIME 构建 -> 授权 -> Gmail 发送
pub mod address;
pub mod gmail;
pub mod mime;
pub mod sender;

pub use sender::{MailSender, SendError, SendMailRequest};
