pub mod init;
pub mod replay;
pub mod resend;
pub mod score;
pub mod validate;
