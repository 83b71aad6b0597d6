use super::{Invocation, OpResult};
use crate::response::Reply;
use std::fs;
use std::path::{Path, PathBuf};

/// Placeholder checksum written by `findfiles0`.
pub const ZERO_CHECKSUM: &str = "00000000000000000000000000000000";

/// Depth sentinel for "unlimited": below every depth with a meaning.
const UNLIMITED_DEPTH: i64 = -5;

/// Starting depth that skips the content directory and the endpoint file.
const EXCLUDE_SITE_INTERNALS: i64 = -2;

fn file_md5(path: &Path) -> std::io::Result<String> {
    Ok(format!("{:x}", md5::compute(fs::read(path)?)))
}

/// Raw file contents. Failures are reported in-band; nothing is prefixed.
pub fn get_file(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let target = inv.ctx.files().resolve(arg).filter(|p| p.is_file());
    let Some(path) = target else {
        reply.line(&format!("NOTAFILE:{arg}"))?;
        return Ok(());
    };
    match fs::File::open(&path) {
        Ok(mut file) => {
            let n = reply.copy_from(&mut file)?;
            tracing::debug!(path = %path.display(), bytes = n, "file streamed");
        }
        Err(_) => reply.line(&format!("CANTREAD:{arg}"))?,
    }
    Ok(())
}

/// Bytes used under `path`. Directory symlinks are not followed.
fn disk_usage(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if meta.file_type().is_symlink() {
        return fs::metadata(path)
            .ok()
            .filter(fs::Metadata::is_file)
            .map_or(0, |m| m.len());
    }
    if meta.is_file() {
        return meta.len();
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| disk_usage(&entry.path()))
        .sum()
}

pub fn disk_usage_of(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    match inv.ctx.files().resolve(arg).filter(|p| fs::metadata(p).is_ok()) {
        Some(path) => reply.text(&disk_usage(&path).to_string())?,
        None => reply.text("NOTFOUND")?,
    }
    Ok(())
}

/// `<depth>:<path>`, depth an optionally negative integer.
fn parse_find_argument(arg: &str) -> Option<(i64, &str)> {
    let (depth, path) = arg.split_once(':')?;
    let digits = depth.strip_prefix('-').unwrap_or(depth);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let depth: i64 = depth.parse().ok()?;
    Some((if depth == 0 { UNLIMITED_DEPTH } else { depth }, path))
}

struct FileWalk<'a> {
    root: &'a Path,
    content_dir: String,
    endpoint_file: &'a str,
    checksums: bool,
}

impl FileWalk<'_> {
    fn file_line(&self, rel: &str, reply: &mut Reply<'_>) -> std::io::Result<()> {
        let path = self.root.join(rel);
        let checksum = if self.checksums {
            file_md5(&path).ok()
        } else {
            fs::File::open(&path).ok().map(|_| ZERO_CHECKSUM.to_string())
        };
        match checksum {
            Some(sum) => reply.line(&format!("f:{sum}:{rel}")),
            None => reply.line(&format!("f:CANNOTREAD:{rel}")),
        }
    }

    /// Depth counts down per level; recursion stops at 0. Starting at
    /// [`EXCLUDE_SITE_INTERNALS`] the first level sees -3, which hides the
    /// site internals at the top only.
    fn walk(&self, folder: &str, remaining: i64, reply: &mut Reply<'_>) -> std::io::Result<()> {
        let remaining = remaining - 1;
        let top_level_exclusions = remaining == EXCLUDE_SITE_INTERNALS - 1;
        reply.line(&format!("d:{folder}"))?;

        let Ok(entries) = fs::read_dir(self.root.join(folder)) else {
            return Ok(());
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        for name in names {
            let rel = format!("{folder}/{name}");
            let path = self.root.join(&rel);
            let link = fs::symlink_metadata(&path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);

            if path.is_file() {
                if !(top_level_exclusions && name == self.endpoint_file) {
                    self.file_line(&rel, reply)?;
                }
            } else if link {
                let target = fs::read_link(&path).unwrap_or_default();
                reply.line(&format!("l:{rel}:{}", target.display()))?;
            } else if path.is_dir()
                && remaining != 0
                && !(top_level_exclusions && name == self.content_dir)
            {
                self.walk(&rel, remaining, reply)?;
            }
        }
        Ok(())
    }
}

fn find_files(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>, checksums: bool) -> OpResult {
    let Some((depth, rel)) = parse_find_argument(arg) else {
        reply.text("INVALIDDATA")?;
        return Ok(());
    };
    let files = inv.ctx.files();
    let Some(path) = files.resolve(rel) else {
        reply.text("NOTFOUND")?;
        return Ok(());
    };
    let walk = FileWalk {
        root: files.root(),
        content_dir: files.content_dir().to_string_lossy().into_owned(),
        endpoint_file: files.endpoint_file(),
        checksums,
    };

    if path.is_dir() {
        reply.line("OK")?;
        walk.walk(rel, depth, reply)?;
        reply.line("x:END")?;
    } else if path.is_file() {
        reply.line("OK")?;
        walk.file_line(rel, reply)?;
        reply.line("x:END")?;
    } else {
        reply.text("NOTFOUND")?;
    }
    Ok(())
}

/// `findfiles5:<depth>:<path>`: listing with MD5 checksums.
pub fn find_files_md5(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    find_files(inv, arg, reply, true)
}

/// `findfiles0:<depth>:<path>`: listing with zeroed checksums.
pub fn find_files_plain(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    find_files(inv, arg, reply, false)
}

pub fn delete_file(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let Some(path) = inv.ctx.files().resolve(arg).filter(|p| p.is_file()) else {
        reply.text("NOSUCHFILE")?;
        return Ok(());
    };
    match fs::remove_file(&path) {
        Ok(()) => reply.text(&format!("DELETED:{}", path.display()))?,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "delete failed");
            reply.error(&path.display().to_string())?;
        }
    }
    Ok(())
}

/// Recursively remove `path` and report it.
fn remove_tree(path: Option<PathBuf>, reply: &mut Reply<'_>) -> OpResult {
    let Some(path) = path.filter(|p| p.is_dir()) else {
        reply.text("NOSUCHDIR")?;
        return Ok(());
    };
    match fs::remove_dir_all(&path) {
        Ok(()) => reply.text(&format!("DELETED:{}", path.display()))?,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "recursive delete failed");
            reply.error(&path.display().to_string())?;
        }
    }
    Ok(())
}

pub fn delete_dir(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    remove_tree(inv.ctx.files().resolve(arg), reply)
}

pub fn delete_plugin_dir(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    remove_tree(inv.ctx.files().plugin_dir(arg), reply)
}

pub fn delete_theme_dir(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    remove_tree(inv.ctx.files().theme_dir(arg), reply)
}

/// Leave an empty directory at `path`, creating it when missing.
pub fn empty_dir(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let Some(path) = inv.ctx.files().resolve(arg) else {
        reply.text("NOSUCHDIR")?;
        return Ok(());
    };
    if path.is_dir() {
        if let Err(e) = fs::remove_dir_all(&path) {
            tracing::warn!(path = %path.display(), error = %e, "emptying directory failed");
        }
    }
    let _ = fs::create_dir(&path);
    if path.is_dir() {
        reply.text(&format!("DELETED:{}", path.display()))?;
    } else {
        reply.text("NOSUCHDIR")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::Fixture;

    fn md5_hex(s: &str) -> String {
        format!("{:x}", md5::compute(s.as_bytes()))
    }

    #[test]
    fn test_get_file_streams_raw_bytes() {
        let fx = Fixture::new();
        fx.write("notes/a.txt", "hello\nworld");
        assert_eq!(fx.run(get_file, "notes/a.txt"), "hello\nworld");
        assert_eq!(fx.run(get_file, "notes"), "NOTAFILE:notes\n");
        assert_eq!(fx.run(get_file, "../etc/passwd"), "NOTAFILE:../etc/passwd\n");
    }

    #[test]
    fn test_disk_usage() {
        let fx = Fixture::new();
        fx.write("d/a", "12345");
        fx.write("d/sub/b", "123");
        assert_eq!(fx.run(disk_usage_of, "d"), "8");
        assert_eq!(fx.run(disk_usage_of, "d/a"), "5");
        assert_eq!(fx.run(disk_usage_of, "missing"), "NOTFOUND");
    }

    #[test]
    fn test_parse_find_argument() {
        assert_eq!(parse_find_argument("0:."), Some((UNLIMITED_DEPTH, ".")));
        assert_eq!(parse_find_argument("-2:a:b"), Some((-2, "a:b")));
        assert_eq!(parse_find_argument("x:."), None);
        assert_eq!(parse_find_argument("-:."), None);
        assert_eq!(parse_find_argument("3"), None);
    }

    #[test]
    fn test_find_files_lists_tree() {
        let fx = Fixture::new();
        fx.write("site/b.txt", "b");
        fx.write("site/a/c.txt", "c");
        let out = fx.run(find_files_md5, "0:site");
        assert_eq!(
            out,
            format!(
                "OK\nd:site\nd:site/a\nf:{}:site/a/c.txt\nf:{}:site/b.txt\nx:END\n",
                md5_hex("c"),
                md5_hex("b")
            )
        );
    }

    #[test]
    fn test_find_files_depth_limit() {
        let fx = Fixture::new();
        fx.write("site/top.txt", "t");
        fx.write("site/a/deep.txt", "d");
        let out = fx.run(find_files_plain, "1:site");
        assert_eq!(
            out,
            format!("OK\nd:site\nf:{ZERO_CHECKSUM}:site/top.txt\nx:END\n")
        );
    }

    #[test]
    fn test_find_files_excludes_site_internals_at_top_level() {
        let fx = Fixture::new();
        fx.write("sitectl.yaml", "secret: x");
        fx.write("content/plugins/p.php", "<?php");
        fx.write("index.php", "<?php");
        fx.write("inner/sitectl.yaml", "kept");
        let out = fx.run(find_files_plain, "-2:.");
        assert!(out.contains("f:00000000000000000000000000000000:./index.php\n"));
        assert!(out.contains("./inner/sitectl.yaml"));
        assert!(!out.contains("./sitectl.yaml"));
        assert!(!out.contains("content"));
        assert!(out.ends_with("x:END\n"));
    }

    #[test]
    fn test_find_files_single_file_and_errors() {
        let fx = Fixture::new();
        fx.write("one.txt", "1");
        assert_eq!(
            fx.run(find_files_md5, "0:one.txt"),
            format!("OK\nf:{}:one.txt\nx:END\n", md5_hex("1"))
        );
        assert_eq!(
            fx.run(find_files_plain, "0:one.txt"),
            format!("OK\nf:{ZERO_CHECKSUM}:one.txt\nx:END\n")
        );
        assert_eq!(fx.run(find_files_md5, "0:nothing"), "NOTFOUND");
        assert_eq!(fx.run(find_files_md5, "deep:."), "INVALIDDATA");
    }

    #[cfg(unix)]
    #[test]
    fn test_find_files_reports_symlinks_without_following() {
        let fx = Fixture::new();
        fx.write("site/real/f.txt", "x");
        std::os::unix::fs::symlink("real", fx.dir.path().join("site/link")).unwrap();
        let out = fx.run(find_files_plain, "0:site");
        assert!(out.contains("l:site/link:real\n"), "{out}");
        assert_eq!(out.matches("f.txt").count(), 1);
    }

    #[test]
    fn test_delete_file() {
        let fx = Fixture::new();
        fx.write("x.txt", "x");
        let abs = fx.dir.path().join("x.txt");
        assert_eq!(fx.run(delete_file, "x.txt"), format!("DELETED:{}", abs.display()));
        assert!(!abs.exists());
        assert_eq!(fx.run(delete_file, "x.txt"), "NOSUCHFILE");
    }

    #[test]
    fn test_delete_and_empty_dirs() {
        let fx = Fixture::new();
        fx.write("d/sub/f", "x");
        let abs = fx.dir.path().join("d");
        assert_eq!(fx.run(empty_dir, "d"), format!("DELETED:{}", abs.display()));
        assert!(abs.is_dir());
        assert_eq!(fs::read_dir(&abs).unwrap().count(), 0);

        assert_eq!(fx.run(delete_dir, "d"), format!("DELETED:{}", abs.display()));
        assert!(!abs.exists());
        assert_eq!(fx.run(delete_dir, "d"), "NOSUCHDIR");

        assert_eq!(fx.run(empty_dir, "fresh"), format!("DELETED:{}", fx.dir.path().join("fresh").display()));
        assert_eq!(fx.run(empty_dir, "../outside"), "NOSUCHDIR");
    }

    #[test]
    fn test_delete_plugin_and_theme_dirs() {
        let fx = Fixture::new();
        fx.write("content/plugins/akismet/akismet.php", "<?php");
        fx.write("content/themes/twenty/style.css", "");
        let plugin = fx.dir.path().join("content/plugins/akismet");
        assert_eq!(
            fx.run(delete_plugin_dir, "akismet"),
            format!("DELETED:{}", plugin.display())
        );
        assert_eq!(fx.run(delete_plugin_dir, "akismet"), "NOSUCHDIR");
        assert_eq!(fx.run(delete_plugin_dir, "../themes"), "NOSUCHDIR");
        assert!(fx.run(delete_theme_dir, "twenty").starts_with("DELETED:"));
    }
}
