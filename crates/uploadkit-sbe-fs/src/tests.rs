use super::*;
use pretty_assertions::assert_eq;
use std::io::Write;

fn setup() -> (tempfile::TempDir, Filesystem) {
    let root = tempfile::tempdir().unwrap();
    let fs = Filesystem::new(root.path()).unwrap();
    (root, fs)
}

#[test]
fn fs_creates_missing_root() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("nested").join("uploads");
    let fs = Filesystem::new(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(fs.base_dir(), Some(std::fs::canonicalize(&root).unwrap().as_path()));
    assert_eq!(fs.engine_name(), "local");
}

#[test]
fn fs_info() {
    let root = tempfile::tempdir().unwrap();

    let mut file = tempfile::NamedTempFile::new_in(root.path()).unwrap();
    file.write_all(b"Koen was here\n").unwrap();
    let filename = file.path().file_name().unwrap().to_str().unwrap().to_string();
    let meta = file.as_file().metadata().unwrap();

    let fs = Filesystem::new(root.path()).unwrap();

    // Since the filesystem back-end is based on futures, we need a runtime to run it
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let info = rt.block_on(fs.info(&filename)).unwrap();

    assert_eq!(info.full_path, filename);
    assert_eq!(info.name, filename);
    assert_eq!(info.size, meta.len());
    assert!(!info.is_dir);
    assert_eq!(info.mtime, storage::system_time(meta.modified().unwrap()));
}

#[tokio::test]
async fn fs_scenario_mkdir_upload_list_rename() {
    let (_root, fs) = setup();

    fs.mkdir("a/b").await.unwrap();
    let stored = fs.upload("a/b/c.png", &[1u8, 2, 3][..]).await.unwrap();
    assert_eq!(stored, "a/b/c.png");

    let list = fs.list("a/b").await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "c.png");
    assert_eq!(list[0].full_path, "a/b/c.png");
    assert_eq!(list[0].size, 3);
    assert!(!list[0].is_dir);

    fs.rename("a/b/c.png", "a/b/d.png").await.unwrap();
    assert!(!fs.exists("a/b/c.png").await.unwrap());
    assert!(fs.exists("a/b/d.png").await.unwrap());
}

#[tokio::test]
async fn fs_list_counts_files_and_directories() {
    let (_root, fs) = setup();
    for name in ["one.txt", "two.txt", "three.txt"] {
        fs.upload(&format!("docs/{}", name), &b"x"[..]).await.unwrap();
    }
    fs.mkdir("docs/sub1").await.unwrap();
    fs.mkdir("docs/sub2").await.unwrap();

    let list = fs.list("docs").await.unwrap();
    assert_eq!(list.len(), 5);
    assert_eq!(list.iter().filter(|f| f.is_dir).count(), 2);
    assert!(list.iter().filter(|f| f.is_dir).all(|f| f.size == 0));
    assert!(list.iter().all(|f| f.full_path.starts_with("docs/")));
}

#[tokio::test]
async fn fs_list_root_and_empty_dir() {
    let (_root, fs) = setup();
    assert!(fs.list("/").await.unwrap().is_empty());
    fs.mkdir("empty").await.unwrap();
    assert!(fs.list("empty").await.unwrap().is_empty());

    let root = fs.list("").await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].full_path, "empty");
}

#[tokio::test]
async fn fs_list_missing_dir_is_not_found() {
    let (_root, fs) = setup();
    let err = fs.list("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("list nope"));
}

#[tokio::test]
async fn fs_round_trip() {
    let (_root, fs) = setup();
    let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    fs.upload("blob.bin", std::io::Cursor::new(content.clone())).await.unwrap();
    assert_eq!(fs.content("blob.bin").await.unwrap(), content);

    // Overwrites silently and truncates
    fs.upload("blob.bin", &b"short"[..]).await.unwrap();
    assert_eq!(fs.content("blob.bin").await.unwrap(), b"short".to_vec());
}

#[tokio::test]
async fn fs_exists_is_false_after_remove() {
    let (_root, fs) = setup();
    fs.upload("x/y.txt", &b"hallo"[..]).await.unwrap();
    assert!(fs.exists("x/y.txt").await.unwrap());
    fs.remove("x/y.txt").await.unwrap();
    assert!(!fs.exists("x/y.txt").await.unwrap());
    assert_eq!(fs.remove("x/y.txt").await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(fs.info("x/y.txt").await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn fs_remove_refuses_directories() {
    let (_root, fs) = setup();
    fs.mkdir("dir").await.unwrap();
    assert_eq!(fs.remove("dir").await.unwrap_err().kind(), ErrorKind::IsADirectory);
    assert!(fs.exists("dir").await.unwrap());
}

#[tokio::test]
async fn fs_mkdir_is_idempotent() {
    let (_root, fs) = setup();
    fs.mkdir("a/b/c").await.unwrap();
    fs.mkdir("a/b/c").await.unwrap();
    fs.mkdir("a/b").await.unwrap();
    assert!(fs.info("a/b/c").await.unwrap().is_dir);
}

#[tokio::test]
async fn fs_rmdir_is_recursive() {
    let (_root, fs) = setup();
    fs.upload("tree/a/1.txt", &b"1"[..]).await.unwrap();
    fs.upload("tree/a/b/2.txt", &b"2"[..]).await.unwrap();
    fs.rmdir("tree").await.unwrap();
    assert!(!fs.exists("tree").await.unwrap());
    assert_eq!(fs.rmdir("tree").await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(fs.rmdir("/").await.unwrap_err().kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn fs_rename_missing_source() {
    let (_root, fs) = setup();
    assert_eq!(fs.rename("ghost.txt", "other.txt").await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn fs_rename_into_new_directory() {
    let (_root, fs) = setup();
    fs.upload("a.txt", &b"a"[..]).await.unwrap();
    fs.rename("a.txt", "moved/here/a.txt").await.unwrap();
    assert_eq!(fs.content("moved/here/a.txt").await.unwrap(), b"a".to_vec());
}

#[tokio::test]
async fn fs_never_leaves_the_root() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("root");
    let fs = Filesystem::new(&root).unwrap();
    std::fs::write(parent.path().join("secret.txt"), b"secret").unwrap();

    assert_eq!(fs.content("../secret.txt").await.unwrap_err().kind(), ErrorKind::InvalidName);
    assert_eq!(fs.upload("../evil.txt", &b"x"[..]).await.unwrap_err().kind(), ErrorKind::InvalidName);
    assert_eq!(fs.list("a/../../").await.unwrap_err().kind(), ErrorKind::InvalidName);
    assert!(!parent.path().join("evil.txt").exists());

    // Absolute looking paths are rooted at the storage root
    let stored = fs.upload("/etc/passwd", &b"x"[..]).await.unwrap();
    assert_eq!(stored, "etc/passwd");
    assert!(root.join("etc").join("passwd").exists());
}

#[tokio::test]
async fn fs_backslashes_are_separators() {
    let (_root, fs) = setup();
    let stored = fs.upload("win\\style\\file.TXT", &b"x"[..]).await.unwrap();
    assert_eq!(stored, "win/style/file.TXT");
    let list = fs.list("win\\style").await.unwrap();
    assert_eq!(list[0].full_path, "win/style/file.TXT");
}

#[test]
fn fs_full_url() {
    let root = tempfile::tempdir().unwrap();
    let fs = Filesystem::new(root.path()).unwrap();
    assert_eq!(fs.full_url("a/b.png"), "/uploads/a/b.png");

    let fs = Filesystem::with_options(FsOptions {
        root: root.path().to_path_buf(),
        url_prefix: None,
        site_url: "https://example.com/".to_string(),
    })
    .unwrap();
    assert_eq!(fs.full_url("/a/b.png"), "https://example.com/a/b.png");
}

#[test]
fn fs_options_from_settings() {
    let mut s = uploadkit_core::settings::Settings::new();
    assert_eq!(FsOptions::from_settings(&s).unwrap().root, PathBuf::from("uploads"));
    assert_eq!(FsOptions::from_settings(&s).unwrap().url_prefix.as_deref(), Some("/uploads"));

    s.insert(options::UPLOAD_DIR.to_string(), "/srv/files".to_string());
    s.insert(options::SITE_URL.to_string(), "https://example.com".to_string());
    let o = FsOptions::from_settings(&s).unwrap();
    assert_eq!(o.root, PathBuf::from("/srv/files"));
    assert_eq!(o.url_prefix, None);
    assert_eq!(o.site_url, "https://example.com");
}

#[test]
fn fs_io_errors_name_operation_and_path() {
    let path = String::from("a/b.txt");
    let err = io_error("rename", &path)(io::Error::from(io::ErrorKind::NotFound));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("(rename a/b.txt)"), "{}", err);
}
