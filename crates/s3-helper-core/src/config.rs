use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// アップロード時のデフォルト Content-Type
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// s3h 設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
}

/// アップロード設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// すべてのアップロードに付ける Content-Type
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

/// バンドル設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BundleConfig {
    /// アーカイブを作るディレクトリ（デフォルト: カレントディレクトリ）
    pub output_dir: Option<PathBuf>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
        }
    }
}

impl Config {
    /// 設定ファイルのパスを取得
    pub fn config_path() -> Result<PathBuf> {
        let home = env::var("HOME")
            .map_err(|_| crate::Error::Config("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(home).join(".s3h").join("config.toml"))
    }

    /// 設定を読み込み
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定したパスから設定を読み込み。ファイルがなければデフォルト
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// 設定を保存
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// 指定したパスに設定を保存
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                crate::Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::Error::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content).map_err(|e| {
            crate::Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// アーカイブの作成先（未設定ならカレントディレクトリ）
    pub fn output_dir(&self) -> PathBuf {
        self.bundle
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
