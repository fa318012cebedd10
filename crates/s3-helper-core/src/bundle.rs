//! ディレクトリをまとめてアップロードするバンドル処理
//!
//! 1. 各ディレクトリを並列に `<name>_bundle.zip` へ圧縮する
//! 2. できあがったアーカイブを順番にアップロードする
//! 3. アップロードの成否にかかわらずローカルのアーカイブを削除する

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinSet;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::bucket::{self, Outcome};
use crate::output::Sink;
use crate::{utils, Error, Result, StorageBackend};

/// アーカイブ名の接尾辞
pub const ARCHIVE_SUFFIX: &str = "_bundle.zip";

/// アップロード中に進捗ドットを出す間隔
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// アーカイブとアップロード先キーの組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// ローカルのアーカイブパス
    pub archive: PathBuf,
    /// S3 のキー
    pub key: String,
}

/// 圧縮フェーズの結果
#[derive(Debug, Default)]
pub struct Packaged {
    /// 完了順に並んだアーカイブ
    pub entries: Vec<BundleEntry>,
    pub errors: Vec<Error>,
}

/// バンドル処理の入力
#[derive(Debug, Clone, Copy)]
pub struct BundleRequest<'a> {
    pub bucket: &'a str,
    pub sources: &'a [PathBuf],
    /// アーカイブを作るディレクトリ
    pub output_dir: &'a Path,
    pub content_type: &'a str,
}

/// ディレクトリに対応するアーカイブ名
pub fn archive_name(dir: &Path) -> Result<String> {
    Ok(format!("{}{}", utils::dir_base_name(dir)?, ARCHIVE_SUFFIX))
}

/// ディレクトリを zip に圧縮し、アーカイブのサイズを返す。
/// 同名のアーカイブは上書きする。
pub fn zip_directory(source: &Path, archive: &Path) -> Result<u64> {
    if archive.exists() {
        fs::remove_file(archive)?;
    }

    let file = File::create(archive)?;
    // 出力先が圧縮対象の中にある場合、自分自身は含めない
    let archive_abs = archive.canonicalize()?;
    let mut writer = ZipWriter::new(file);

    for entry in WalkDir::new(source)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, entry_options())?;
        } else if entry.file_type().is_file() {
            if entry.path().canonicalize()? == archive_abs {
                continue;
            }
            let mut options = entry_options();
            if entry.metadata()?.len() > u64::from(u32::MAX) {
                options = options.large_file(true);
            }
            writer.start_file(name, options)?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut writer)?;
        }
    }

    let file = writer.finish()?;
    Ok(file.metadata()?.len())
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// 圧縮フェーズ: 存在するディレクトリだけを並列に圧縮する。
/// ディレクトリでないパスは黙って無視する。
pub async fn package(sources: &[PathBuf], output_dir: &Path, sink: &dyn Sink) -> Packaged {
    let mut packaged = Packaged::default();
    let mut claimed = HashSet::new();
    let mut tasks = JoinSet::new();

    for source in sources {
        if !source.is_dir() {
            tracing::debug!(path = %source.display(), "Not a directory, skipping");
            continue;
        }

        let name = match archive_name(source) {
            Ok(name) => name,
            Err(e) => {
                packaged.errors.push(e);
                continue;
            }
        };
        if !claimed.insert(name.clone()) {
            tracing::warn!(
                path = %source.display(),
                archive = %name,
                "Another source already uses this archive name, skipping"
            );
            continue;
        }

        let source = source.clone();
        let archive = output_dir.join(&name);
        tasks.spawn_blocking(move || match zip_directory(&source, &archive) {
            Ok(size) => Ok((
                BundleEntry {
                    archive,
                    key: name,
                },
                size,
            )),
            Err(e) => {
                let _ = fs::remove_file(&archive);
                Err(e)
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((entry, size))) => {
                tracing::debug!(archive = %entry.archive.display(), size, "Packaged");
                sink.write(&format!("{} ({}) ", entry.key, utils::format_size(size)));
                sink.good("Done");
                packaged.entries.push(entry);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Packaging failed");
                packaged.errors.push(e);
            }
            Err(e) => packaged.errors.push(Error::Task(e.to_string())),
        }
    }

    packaged
}

/// アップロードフェーズ: 先頭から順に 1 件ずつアップロードする。
/// 途中で失敗しても残りのアップロードは続ける。
pub async fn upload(
    client: &dyn StorageBackend,
    bucket: &str,
    entries: &[BundleEntry],
    content_type: &str,
    sink: &dyn Sink,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(entries.len());

    for entry in entries {
        sink.write(&format!("Adding '{}'", entry.key));

        let upload = bucket::upload_file(client, bucket, &entry.key, &entry.archive, content_type);
        tokio::pin!(upload);

        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        ticker.tick().await;

        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut upload => break outcome,
                _ = ticker.tick() => sink.write("."),
            }
        };

        if outcome.is_success() {
            sink.good("Done");
        } else {
            sink.bad("Failed");
        }
        outcomes.push(outcome);
    }

    outcomes
}

/// 後片付け: ローカルのアーカイブを削除し、削除した件数を返す
pub fn cleanup(entries: &[BundleEntry], sink: &dyn Sink) -> usize {
    let mut removed = 0;

    for entry in entries {
        match fs::remove_file(&entry.archive) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(archive = %entry.archive.display(), error = %e, "Failed to remove archive");
            }
        }
        sink.write(".");
    }

    removed
}

/// バンドル処理全体を実行する
pub async fn run_bundle(
    client: &dyn StorageBackend,
    request: BundleRequest<'_>,
    sink: &dyn Sink,
) -> Outcome {
    sink.line("Starting...");
    let packaged = package(request.sources, request.output_dir, sink).await;

    sink.line("Uploading content...");
    let outcomes = upload(
        client,
        request.bucket,
        &packaged.entries,
        request.content_type,
        sink,
    )
    .await;
    sink.line("Finished uploads.");

    sink.write("Cleaning up");
    let removed = cleanup(&packaged.entries, sink);
    sink.good("Done");
    tracing::info!(
        bucket = request.bucket,
        uploaded = outcomes.iter().filter(|o| o.is_success()).count(),
        removed,
        "Bundle finished"
    );
    sink.line("Bundle completed.");

    if let Some(err) = packaged.errors.into_iter().next() {
        return Outcome::HardFailure(err);
    }
    outcomes
        .into_iter()
        .find(|o| !o.is_success())
        .unwrap_or(Outcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use crate::MockStorageBackend;
    use mockall::Sequence;
    use std::io::{Read, Write};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn make_source(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::create_dir_all(dir.join("empty")).unwrap();
        let mut file = File::create(dir.join("readme.txt")).unwrap();
        file.write_all(name.as_bytes()).unwrap();
        fs::write(dir.join("nested").join("data.csv"), "a,b\n1,2\n").unwrap();
        dir
    }

    fn bundle_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(ARCHIVE_SUFFIX))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_archive_name() -> Result<()> {
        assert_eq!(archive_name(Path::new("./dirA"))?, "dirA_bundle.zip");
        assert_eq!(archive_name(Path::new("/srv/site/"))?, "site_bundle.zip");
        Ok(())
    }

    #[test]
    fn test_zip_directory_keeps_relative_layout() -> Result<()> {
        let temp = TempDir::new()?;
        let source = make_source(temp.path(), "docs");
        let archive = temp.path().join("docs_bundle.zip");

        let size = zip_directory(&source, &archive)?;
        assert!(size > 0);

        let mut zip = zip::ZipArchive::new(File::open(&archive)?)?;
        let mut contents = String::new();
        zip.by_name("nested/data.csv")?.read_to_string(&mut contents)?;
        assert_eq!(contents, "a,b\n1,2\n");
        assert!(zip.by_name("readme.txt").is_ok());
        assert!(zip.by_name("empty/").is_ok());
        Ok(())
    }

    #[test]
    fn test_zip_directory_skips_its_own_archive() -> Result<()> {
        let temp = TempDir::new()?;
        let source = make_source(temp.path(), "self");
        let archive = source.join("self_bundle.zip");

        zip_directory(&source, &archive)?;

        let zip = zip::ZipArchive::new(File::open(&archive)?)?;
        assert!(zip.file_names().all(|n| n != "self_bundle.zip"));
        Ok(())
    }

    #[tokio::test]
    async fn test_package_only_directories() {
        let sources_root = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let dir_a = make_source(sources_root.path(), "dirA");
        let dir_b = make_source(sources_root.path(), "dirB");
        let plain_file = sources_root.path().join("notes.txt");
        fs::write(&plain_file, "not a directory").unwrap();
        let missing = sources_root.path().join("missing");

        let sink = BufferSink::new();
        let packaged = package(
            &[dir_a, plain_file, dir_b, missing],
            output.path(),
            &sink,
        )
        .await;

        assert!(packaged.errors.is_empty());
        assert_eq!(packaged.entries.len(), 2);
        assert_eq!(
            bundle_files(output.path()),
            vec!["dirA_bundle.zip", "dirB_bundle.zip"]
        );
        for entry in &packaged.entries {
            assert_eq!(entry.archive, output.path().join(&entry.key));
        }
        assert_eq!(sink.lines().iter().filter(|l| l.ends_with("Done")).count(), 2);
    }

    #[tokio::test]
    async fn test_package_overwrites_stale_archive() {
        let sources_root = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = make_source(sources_root.path(), "site");
        fs::write(output.path().join("site_bundle.zip"), "stale").unwrap();

        let packaged = package(&[source], output.path(), &BufferSink::new()).await;

        assert_eq!(packaged.entries.len(), 1);
        let zip = zip::ZipArchive::new(File::open(&packaged.entries[0].archive).unwrap());
        assert!(zip.is_ok());
    }

    #[tokio::test]
    async fn test_package_skips_duplicate_names() {
        let root = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let first = make_source(&root.path().join("one"), "app");
        let second = make_source(&root.path().join("two"), "app");

        let packaged = package(&[first, second], output.path(), &BufferSink::new()).await;

        assert_eq!(packaged.entries.len(), 1);
        assert_eq!(bundle_files(output.path()), vec!["app_bundle.zip"]);
    }

    #[tokio::test]
    async fn test_upload_in_collection_order() {
        let entries = vec![
            BundleEntry {
                archive: PathBuf::from("/tmp/b_bundle.zip"),
                key: "b_bundle.zip".into(),
            },
            BundleEntry {
                archive: PathBuf::from("/tmp/a_bundle.zip"),
                key: "a_bundle.zip".into(),
            },
        ];

        let mut seq = Sequence::new();
        let mut backend = MockStorageBackend::new();
        backend
            .expect_put_object()
            .withf(|_, key, _, _| key == "b_bundle.zip")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        backend
            .expect_put_object()
            .withf(|_, key, _, _| key == "a_bundle.zip")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));

        let sink = BufferSink::new();
        let outcomes = upload(&backend, "bucket", &entries, "text/plain", &sink).await;

        assert!(outcomes.iter().all(Outcome::is_success));
        assert_eq!(
            sink.lines(),
            vec!["Adding 'b_bundle.zip'Done", "Adding 'a_bundle.zip'Done"]
        );
    }

    #[tokio::test]
    async fn test_run_bundle_uploads_and_cleans_up() {
        let sources_root = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let sources = vec![
            make_source(sources_root.path(), "dirA"),
            make_source(sources_root.path(), "dirB"),
        ];

        let uploaded = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&uploaded);
        let mut backend = MockStorageBackend::new();
        backend
            .expect_put_object()
            .withf(|bucket, _, path, content_type| {
                bucket == "my-bucket" && path.exists() && content_type == "application/zip"
            })
            .times(2)
            .returning(move |_, key, _, _| {
                recorder.lock().unwrap().push(key.to_string());
                Ok(())
            });

        let sink = BufferSink::new();
        let request = BundleRequest {
            bucket: "my-bucket",
            sources: &sources,
            output_dir: output.path(),
            content_type: "application/zip",
        };
        let outcome = run_bundle(&backend, request, &sink).await;

        assert!(outcome.is_success());
        let mut keys = uploaded.lock().unwrap().clone();
        keys.sort();
        assert_eq!(keys, vec!["dirA_bundle.zip", "dirB_bundle.zip"]);
        assert!(bundle_files(output.path()).is_empty());
        assert!(sink.contents().contains("Cleaning up..Done"));
        assert_eq!(sink.lines().last().map(String::as_str), Some("Bundle completed."));
    }

    #[tokio::test]
    async fn test_run_bundle_cleans_up_after_failed_upload() {
        let sources_root = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let sources = vec![
            make_source(sources_root.path(), "good"),
            make_source(sources_root.path(), "bad"),
        ];

        let mut backend = MockStorageBackend::new();
        backend
            .expect_put_object()
            .withf(|_, key, _, _| key == "bad_bundle.zip")
            .times(1)
            .returning(|_, _, _, _| Err(Error::backend(Some("InvalidAccessKeyId"), "denied")));
        backend
            .expect_put_object()
            .withf(|_, key, _, _| key == "good_bundle.zip")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let sink = BufferSink::new();
        let request = BundleRequest {
            bucket: "my-bucket",
            sources: &sources,
            output_dir: output.path(),
            content_type: "text/plain",
        };
        let outcome = run_bundle(&backend, request, &sink).await;

        assert!(matches!(outcome, Outcome::HardFailure(Error::Credentials)));
        assert!(bundle_files(output.path()).is_empty());
        assert!(sink.contents().contains("Adding 'bad_bundle.zip'Failed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_directory_follows_symlinks() -> Result<()> {
        let temp = TempDir::new()?;
        let shared = temp.path().join("shared.txt");
        fs::write(&shared, "linked")?;
        let source = make_source(temp.path(), "linked");
        std::os::unix::fs::symlink(&shared, source.join("shared.txt"))?;
        let archive = temp.path().join("linked_bundle.zip");

        zip_directory(&source, &archive)?;

        let mut zip = zip::ZipArchive::new(File::open(&archive)?)?;
        let mut contents = String::new();
        zip.by_name("shared.txt")?.read_to_string(&mut contents)?;
        assert_eq!(contents, "linked");
        Ok(())
    }

    #[tokio::test]
    async fn test_run_bundle_reports_packaging_failure() {
        let sources_root = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let sources = vec![
            make_source(sources_root.path(), "good"),
            make_source(sources_root.path(), "blocked"),
        ];
        // 同名のディレクトリがあるとアーカイブを作れない
        fs::create_dir(output.path().join("blocked_bundle.zip")).unwrap();

        let mut backend = MockStorageBackend::new();
        backend
            .expect_put_object()
            .withf(|_, key, _, _| key == "good_bundle.zip")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let sink = BufferSink::new();
        let request = BundleRequest {
            bucket: "my-bucket",
            sources: &sources,
            output_dir: output.path(),
            content_type: "text/plain",
        };
        let outcome = run_bundle(&backend, request, &sink).await;

        assert!(matches!(outcome, Outcome::HardFailure(Error::Io(_))));
        assert!(!output.path().join("good_bundle.zip").exists());
        assert!(output.path().join("blocked_bundle.zip").is_dir());
        assert!(sink.contents().contains("Adding 'good_bundle.zip'Done"));
        assert!(sink.contents().contains("Cleaning up.Done"));
    }

    #[test]
    fn test_cleanup_ignores_missing_archives() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("x_bundle.zip");
        fs::write(&present, "zip").unwrap();
        let entries = vec![
            BundleEntry {
                archive: present.clone(),
                key: "x_bundle.zip".into(),
            },
            BundleEntry {
                archive: temp.path().join("gone_bundle.zip"),
                key: "gone_bundle.zip".into(),
            },
        ];

        let sink = BufferSink::new();
        assert_eq!(cleanup(&entries, &sink), 1);
        assert!(!present.exists());
        assert_eq!(sink.contents(), "..");
    }
}
