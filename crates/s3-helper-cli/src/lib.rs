//! s3h のコマンドライン層
//!
//! 引数の解釈と操作の順序付けだけを担当し、S3 とのやり取りは
//! `s3-helper-core` に任せる。

pub mod cli;
pub mod driver;

pub use driver::{run, ExitStatus, Settings};
