//! ユーザー向けの出力先
//!
//! 進捗メッセージはすべて `Sink` を経由する。サイレントモードでは
//! `Gated` が出力を握りつぶす。

use std::io::{self, Write};
use std::sync::Mutex;

use colored::*;

/// メッセージの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Good,
    Bad,
}

/// テキストの出力先
pub trait Sink: Send + Sync {
    fn emit(&self, text: &str, tone: Tone, newline: bool);

    /// 1 行出力
    fn line(&self, text: &str) {
        self.emit(text, Tone::Plain, true);
    }

    /// 改行なしで出力
    fn write(&self, text: &str) {
        self.emit(text, Tone::Plain, false);
    }

    fn good(&self, text: &str) {
        self.emit(text, Tone::Good, true);
    }

    fn bad(&self, text: &str) {
        self.emit(text, Tone::Bad, true);
    }
}

/// 標準出力に書き込む Sink
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn emit(&self, text: &str, tone: Tone, newline: bool) {
        let text = match tone {
            Tone::Plain => text.normal(),
            Tone::Good => text.green(),
            Tone::Bad => text.red(),
        };

        let mut stdout = io::stdout().lock();
        let _ = if newline {
            writeln!(stdout, "{}", text)
        } else {
            write!(stdout, "{}", text).and_then(|_| stdout.flush())
        };
    }
}

/// `vocal` が false のとき何も出力しない Sink
pub struct Gated<'a> {
    inner: &'a dyn Sink,
    vocal: bool,
}

impl<'a> Gated<'a> {
    pub fn new(inner: &'a dyn Sink, vocal: bool) -> Self {
        Self { inner, vocal }
    }
}

impl Sink for Gated<'_> {
    fn emit(&self, text: &str, tone: Tone, newline: bool) {
        if self.vocal {
            self.inner.emit(text, tone, newline);
        }
    }
}

/// 出力をメモリに溜める Sink
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでの出力全体
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// 出力を行単位で取得
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Sink for BufferSink {
    fn emit(&self, text: &str, _tone: Tone, newline: bool) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_str(text);
            if newline {
                buffer.push('\n');
            }
        }
    }
}
